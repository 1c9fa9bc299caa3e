//! HTTP transfer layer: client, retry, pacing and document fetches.
//!
//! # Features
//!
//! - Streaming downloads through a fixed-size buffer into temp files
//! - Never overwrites: existing documents short-circuit without a request
//! - 404 reported as an outcome, not an error
//! - Bounded retry with exponential backoff and `Retry-After` support
//! - Per-host request pacing
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use harvester_core::download::{DownloadManager, HttpClient, NoopProgress, RateLimiter, RetryPolicy};
//! use harvester_core::store::DocumentStore;
//! use harvester_core::target::DownloadTarget;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = DocumentStore::open("data/labels").await?;
//! let manager = DownloadManager::new(
//!     HttpClient::new()?,
//!     store,
//!     RetryPolicy::default(),
//!     Arc::new(RateLimiter::disabled()),
//! );
//! let elabels = Url::parse("https://elabels.apvma.gov.au/")?;
//! if let Some(target) = DownloadTarget::for_product_id(&elabels, "51234") {
//!     let outcome = manager.fetch(&target, &NoopProgress).await;
//!     println!("{outcome:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod filename;
mod manager;
mod progress;
pub mod rate_limiter;
mod retry;

pub use client::HttpClient;
pub(crate) use client::check_status;
pub use error::DownloadError;
pub use filename::{
    PRODUCT_LABEL_SUFFIX, file_name_from_url, product_label_file_name, sanitize_filename,
};
pub use manager::DownloadManager;
pub use progress::{NoopProgress, ProgressObserver};
pub use rate_limiter::{RateLimiter, parse_retry_after};
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
    retry_with_policy,
};
