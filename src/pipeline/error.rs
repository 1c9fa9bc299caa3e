//! Errors that abort a whole pipeline run.
//!
//! Per-product failures never appear here; they are counted in the summary.

use thiserror::Error;

use crate::download::DownloadError;
use crate::export::ExportError;
use crate::portal::PortalError;
use crate::store::StoreError;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 16;

/// Fatal run errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The document store directory could not be created.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The session token could not be obtained.
    #[error("cannot start a portal session: {0}")]
    Session(#[source] PortalError),

    /// An HTTP client could not be built.
    #[error("cannot build HTTP client: {0}")]
    Client(#[source] DownloadError),

    /// The results export could not be read.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}
