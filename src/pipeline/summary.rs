//! End-of-run counters.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use crate::target::DownloadOutcome;

/// Counts for a portal scrape run.
///
/// `downloaded` counts every successful outcome; `already_present` is the
/// part of it satisfied from the store without a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Distinct product links found by the search walk.
    pub discovered: usize,
    /// Products whose detail page yielded no document target.
    pub unresolved: usize,
    /// Targets now present in the store.
    pub downloaded: usize,
    /// Targets that were already in the store.
    pub already_present: usize,
    /// Targets answered with 404.
    pub skipped_not_found: usize,
    /// Targets that failed after all attempts.
    pub failed: usize,
}

/// Counts for a run driven by a results export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Usable rows in the export.
    pub listed: usize,
    /// Rows left after deduplication by active ingredients.
    pub unique: usize,
    /// Targets now present in the store.
    pub downloaded: usize,
    /// Targets that were already in the store.
    pub already_present: usize,
    /// Targets answered with 404.
    pub skipped_not_found: usize,
    /// Targets that failed after all attempts.
    pub failed: usize,
}

/// Classification of one fetch, shared with later targets of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutcomeKind {
    /// In the store; `fetched` is false when no request was made.
    Downloaded { fetched: bool },
    NotFound,
    Failed,
}

impl From<&DownloadOutcome> for OutcomeKind {
    fn from(outcome: &DownloadOutcome) -> Self {
        match outcome {
            DownloadOutcome::Success { fetched, .. } => Self::Downloaded { fetched: *fetched },
            DownloadOutcome::NotFound { .. } => Self::NotFound,
            DownloadOutcome::Failed { .. } => Self::Failed,
        }
    }
}

/// Thread-safe outcome counters shared by the fetch tasks of one run.
#[derive(Debug, Default)]
pub(crate) struct OutcomeStats {
    unresolved: AtomicUsize,
    downloaded: AtomicUsize,
    already_present: AtomicUsize,
    not_found: AtomicUsize,
    failed: AtomicUsize,
}

impl OutcomeStats {
    pub(crate) fn record(&self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Downloaded { fetched } => {
                self.downloaded.fetch_add(1, Ordering::SeqCst);
                if !fetched {
                    self.already_present.fetch_add(1, Ordering::SeqCst);
                }
            }
            OutcomeKind::NotFound => {
                self.not_found.fetch_add(1, Ordering::SeqCst);
            }
            OutcomeKind::Failed => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// A target whose file name was fetched by an earlier claimant in the run.
    /// It shares that fetch's classification; a stored document counts as
    /// already present.
    pub(crate) fn record_duplicate(&self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Downloaded { .. } => self.record(OutcomeKind::Downloaded { fetched: false }),
            other => self.record(other),
        }
    }

    pub(crate) fn record_unresolved(&self) {
        self.unresolved.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn run_summary(&self, discovered: usize) -> RunSummary {
        RunSummary {
            discovered,
            unresolved: self.unresolved.load(Ordering::SeqCst),
            downloaded: self.downloaded.load(Ordering::SeqCst),
            already_present: self.already_present.load(Ordering::SeqCst),
            skipped_not_found: self.not_found.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn export_summary(&self, listed: usize, unique: usize) -> ExportSummary {
        ExportSummary {
            listed,
            unique,
            downloaded: self.downloaded.load(Ordering::SeqCst),
            already_present: self.already_present.load(Ordering::SeqCst),
            skipped_not_found: self.not_found.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use crate::download::DownloadError;

    #[test]
    fn test_record_splits_fresh_and_present_successes() {
        let stats = OutcomeStats::default();
        let fresh = OutcomeKind::from(&DownloadOutcome::Success {
            path: PathBuf::from("a.pdf"),
            bytes: 10,
            fetched: true,
        });
        stats.record(fresh);
        stats.record(OutcomeKind::from(&DownloadOutcome::Success {
            path: PathBuf::from("b.pdf"),
            bytes: 0,
            fetched: false,
        }));
        stats.record_duplicate(fresh);
        stats.record(OutcomeKind::from(&DownloadOutcome::NotFound {
            url: "https://h/c.pdf".to_string(),
        }));
        stats.record(OutcomeKind::from(&DownloadOutcome::Failed {
            error: DownloadError::timeout("https://h/d.pdf"),
            attempts: 3,
        }));
        stats.record_unresolved();

        let summary = stats.run_summary(6);
        assert_eq!(
            summary,
            RunSummary {
                discovered: 6,
                unresolved: 1,
                downloaded: 3,
                already_present: 2,
                skipped_not_found: 1,
                failed: 1,
            }
        );
    }

    #[test]
    fn test_duplicates_share_the_first_classification() {
        let stats = OutcomeStats::default();
        stats.record(OutcomeKind::NotFound);
        stats.record_duplicate(OutcomeKind::NotFound);
        stats.record(OutcomeKind::Failed);
        stats.record_duplicate(OutcomeKind::Failed);

        let summary = stats.run_summary(4);
        assert_eq!(summary.downloaded, 0);
        assert_eq!(summary.already_present, 0);
        assert_eq!(summary.skipped_not_found, 2);
        assert_eq!(summary.failed, 2);
    }

    #[test]
    fn test_run_summary_serializes_field_names() {
        let json = serde_json::to_value(RunSummary {
            discovered: 2,
            ..RunSummary::default()
        })
        .unwrap();
        assert_eq!(json["discovered"], 2);
        assert_eq!(json["skipped_not_found"], 0);
    }
}
