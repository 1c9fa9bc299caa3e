//! Terminal progress bars for document transfers.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use harvester_core::download::ProgressObserver;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str = "{spinner} {msg:24!} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:24!} {bytes} ({bytes_per_sec})";

/// One bar per in-flight transfer, stacked in a [`MultiProgress`].
pub(crate) struct TransferBars {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl TransferBars {
    /// Bars drawn to stderr.
    pub(crate) fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn style(total: Option<u64>) -> ProgressStyle {
        let template = if total.is_some() {
            BAR_TEMPLATE
        } else {
            SPINNER_TEMPLATE
        };
        ProgressStyle::with_template(template)
            .map(|style| style.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl ProgressObserver for TransferBars {
    fn on_start(&self, name: &str, total: Option<u64>) {
        let bar = self
            .multi
            .add(total.map_or_else(ProgressBar::no_length, ProgressBar::new));
        bar.set_style(Self::style(total));
        bar.set_message(name.to_string());
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), bar);
    }

    fn on_bytes(&self, name: &str, bytes: u64) {
        if let Some(bar) = self
            .bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            bar.inc(bytes);
        }
    }

    fn on_finish(&self, name: &str) {
        let bar = self
            .bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        if let Some(bar) = bar {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bars_track_transfer_lifecycle() {
        let bars = TransferBars::with_target(ProgressDrawTarget::hidden());
        bars.on_start("A.pdf", Some(100));
        bars.on_bytes("A.pdf", 40);
        {
            let map = bars.bars.lock().unwrap();
            assert_eq!(map.get("A.pdf").map(ProgressBar::position), Some(40));
        }
        bars.on_finish("A.pdf");
        assert!(bars.bars.lock().unwrap().is_empty());
    }

    #[test]
    fn test_bytes_for_unknown_transfer_are_ignored() {
        let bars = TransferBars::with_target(ProgressDrawTarget::hidden());
        bars.on_bytes("missing.pdf", 10);
        bars.on_finish("missing.pdf");
        assert!(bars.bars.lock().unwrap().is_empty());
    }
}
