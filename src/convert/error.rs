//! Error types for the conversion stage.

use std::path::PathBuf;

use thiserror::Error;

use crate::download::DownloadError;
use crate::store::StoreError;

/// Errors converting stored documents.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// No API key was configured for the parsing service.
    #[error("{variable} is not set; the parsing service needs an API key")]
    MissingApiKey {
        /// Environment variable that was checked.
        variable: &'static str,
    },

    /// The source document could not be read.
    #[error("cannot read document {path}: {source}")]
    Read {
        /// Document path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A request to the parsing service failed.
    #[error(transparent)]
    Http(#[from] DownloadError),

    /// The service answered with a body that could not be understood.
    #[error("unexpected response from {url}: {reason}")]
    UnexpectedResponse {
        /// Endpoint that answered.
        url: String,
        /// What was wrong with the body.
        reason: String,
    },

    /// The parsing job ended without a result.
    #[error("parsing job {job_id} ended with status {status}")]
    JobFailed {
        /// Service-side job identifier.
        job_id: String,
        /// Terminal status reported by the service.
        status: String,
    },

    /// The parsing job did not finish before the poll deadline.
    #[error("parsing job {job_id} still running after {waited_secs}s")]
    JobTimedOut {
        /// Service-side job identifier.
        job_id: String,
        /// Seconds spent polling.
        waited_secs: u64,
    },

    /// Reading or writing a store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ConvertError {
    /// Creates an `UnexpectedResponse` error.
    pub fn unexpected_response(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
