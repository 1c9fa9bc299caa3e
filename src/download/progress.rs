//! Byte-level progress callbacks for document transfers.
//!
//! The transfer loop reports to an observer and knows nothing about how (or
//! whether) progress is displayed.

/// Receives progress for individual document transfers.
///
/// Calls for one `name` arrive in order: `on_start`, any number of
/// `on_bytes`, then `on_finish`. Calls for different names interleave when
/// transfers run concurrently.
pub trait ProgressObserver: Send + Sync {
    /// A transfer started. `total` is the Content-Length when the server sent one.
    fn on_start(&self, name: &str, total: Option<u64>);

    /// `bytes` more bytes were written for `name`.
    fn on_bytes(&self, name: &str, bytes: u64);

    /// The transfer ended, successfully or not.
    fn on_finish(&self, name: &str);
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn on_start(&self, _name: &str, _total: Option<u64>) {}

    fn on_bytes(&self, _name: &str, _bytes: u64) {}

    fn on_finish(&self, _name: &str) {}
}
