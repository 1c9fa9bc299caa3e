//! Label Harvester Core Library
//!
//! Discovers regulatory product labels on a paginated search portal, fetches
//! the label documents idempotently into a local store and hands them to a
//! conversion stage.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`store`] - Flat document directory with atomic write-if-absent
//! - [`download`] - HTTP client, retry, pacing and the download manager
//! - [`portal`] - Session token, paginated search walk and detail resolution
//! - [`export`] - Download lists from a portal results export (CSV)
//! - [`pipeline`] - Run orchestration and end-of-run summaries
//! - [`convert`] - PDF to markdown conversion over the store

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod convert;
pub mod download;
pub mod export;
pub mod pipeline;
pub mod portal;
pub mod store;
pub mod target;

pub(crate) mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use convert::{ConversionStage, ConversionSummary, ConvertError, Converter, LlamaParseConverter};
pub use download::{
    DEFAULT_MAX_RETRIES, DownloadError, DownloadManager, FailureType, HttpClient, NoopProgress,
    ProgressObserver, RateLimiter, RetryDecision, RetryPolicy, classify_error,
};
pub use export::{ExportError, ExportProduct};
pub use pipeline::{
    DEFAULT_CONCURRENCY, ExportSummary, Pipeline, PipelineConfig, PipelineError, RunSummary,
};
pub use portal::{
    DetailResolver, PortalClient, PortalConfig, PortalError, ProductLink, SearchCriteria,
    SearchWalker, SessionResolver, SessionToken,
};
pub use store::{CommitOutcome, DocumentStore, PendingWrite, StoreError};
pub use target::{DownloadOutcome, DownloadTarget};
