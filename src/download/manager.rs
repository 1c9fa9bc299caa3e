//! Idempotent document fetches into the [`DocumentStore`].
//!
//! `fetch` never overwrites: a target whose file already exists is reported as
//! a success without any request. A 404 is an expected answer ("no label filed
//! for this product") and yields [`DownloadOutcome::NotFound`]; everything
//! else that goes wrong yields [`DownloadOutcome::Failed`] with the cause kept.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::client::{HttpClient, stream_to_pending};
use super::error::DownloadError;
use super::progress::ProgressObserver;
use super::rate_limiter::RateLimiter;
use super::retry::{RetryPolicy, retry_with_policy};
use crate::store::{CommitOutcome, DocumentStore};
use crate::target::{DownloadOutcome, DownloadTarget};

/// Fetches [`DownloadTarget`]s into a document store.
///
/// Cheap to clone; clones share the connection pool and the pacing state.
#[derive(Debug, Clone)]
pub struct DownloadManager {
    client: HttpClient,
    store: DocumentStore,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
}

impl DownloadManager {
    /// Creates a manager writing into `store`.
    #[must_use]
    pub fn new(
        client: HttpClient,
        store: DocumentStore,
        retry_policy: RetryPolicy,
        rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            client,
            store,
            retry_policy,
            rate_limiter,
        }
    }

    /// The store documents are written into.
    #[must_use]
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Fetches one target, reporting bytes to `observer`.
    ///
    /// Never returns an error: every failure is folded into the outcome.
    #[instrument(skip(self, observer), fields(url = %target.url(), file = target.file_name()))]
    pub async fn fetch(
        &self,
        target: &DownloadTarget,
        observer: &dyn ProgressObserver,
    ) -> DownloadOutcome {
        match self.store.contains(target.file_name()).await {
            Ok(true) => {
                debug!("already in store, skipping request");
                return DownloadOutcome::Success {
                    path: self.store.root().join(target.file_name()),
                    bytes: 0,
                    fetched: false,
                };
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "store lookup failed");
                return DownloadOutcome::Failed {
                    error: DownloadError::Store(e),
                    attempts: 0,
                };
            }
        }

        let result = retry_with_policy(
            &self.retry_policy,
            &self.rate_limiter,
            target.url(),
            move || self.fetch_once(target, observer),
        )
        .await;

        match result {
            Ok((CommitOutcome::Stored(path), bytes)) => {
                info!(bytes, path = %path.display(), "downloaded");
                DownloadOutcome::Success {
                    path,
                    bytes,
                    fetched: true,
                }
            }
            Ok((CommitOutcome::AlreadyPresent(path), _)) => {
                debug!("another writer stored the document first");
                DownloadOutcome::Success {
                    path,
                    bytes: 0,
                    fetched: false,
                }
            }
            Err((error, _)) if error.is_not_found() => {
                info!("no document at URL (404)");
                DownloadOutcome::NotFound {
                    url: target.url().to_string(),
                }
            }
            Err((error, attempts)) => {
                warn!(error = %error, attempts, "download failed");
                DownloadOutcome::Failed { error, attempts }
            }
        }
    }

    async fn fetch_once(
        &self,
        target: &DownloadTarget,
        observer: &dyn ProgressObserver,
    ) -> Result<(CommitOutcome, u64), DownloadError> {
        let response = self.client.get(target.url()).await?;
        let name = target.file_name();
        let mut pending = self.store.begin_write(name).await?;

        observer.on_start(name, response.content_length());
        let streamed = stream_to_pending(response, &mut pending, name, observer).await;
        observer.on_finish(name);

        match streamed {
            Ok(bytes) => {
                let outcome = pending.commit().await?;
                Ok((outcome, bytes))
            }
            Err(e) => {
                pending.abort().await;
                Err(e)
            }
        }
    }
}
