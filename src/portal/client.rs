//! Cookie-carrying HTTP access to the portal.

use std::sync::Arc;

use reqwest::cookie::Jar;
use url::Url;

use crate::download::constants::{PORTAL_CONNECT_TIMEOUT_SECS, PORTAL_READ_TIMEOUT_SECS};
use crate::download::{DownloadError, HttpClient, RateLimiter, RetryPolicy, retry_with_policy};

/// HTTP client for portal pages.
///
/// One cookie jar is shared by every clone, so the server-side session set up
/// with the token follows the search and detail requests.
#[derive(Debug, Clone)]
pub struct PortalClient {
    http: HttpClient,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
}

impl PortalClient {
    /// Client with the portal timeouts (10s connect, 30s total).
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the client cannot be built.
    pub fn new(
        retry_policy: RetryPolicy,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, DownloadError> {
        Self::with_timeouts(
            PORTAL_CONNECT_TIMEOUT_SECS,
            PORTAL_READ_TIMEOUT_SECS,
            retry_policy,
            rate_limiter,
        )
    }

    /// Client with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the client cannot be built.
    pub fn with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
        retry_policy: RetryPolicy,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, DownloadError> {
        let jar = Arc::new(Jar::default());
        let http = HttpClient::with_timeouts(connect_timeout_secs, read_timeout_secs, Some(jar))?;
        Ok(Self {
            http,
            retry_policy,
            rate_limiter,
        })
    }

    /// Single paced GET with no retry.
    ///
    /// # Errors
    ///
    /// Returns the transport or status error of the one attempt.
    pub async fn get_once(&self, url: &Url) -> Result<String, DownloadError> {
        self.rate_limiter.acquire(url).await;
        self.http.get_text(url).await
    }

    /// GET a page with retry. On failure returns the last error and the attempt count.
    ///
    /// # Errors
    ///
    /// Returns the last error once the retry budget is spent or the failure is permanent.
    pub async fn get_page(&self, url: &Url) -> Result<String, (DownloadError, u32)> {
        retry_with_policy(&self.retry_policy, &self.rate_limiter, url, move || {
            self.http.get_text(url)
        })
        .await
    }

    /// POST a form with retry. On failure returns the last error and the attempt count.
    ///
    /// # Errors
    ///
    /// Returns the last error once the retry budget is spent or the failure is permanent.
    pub async fn post_page(
        &self,
        url: &Url,
        form: &[(String, String)],
    ) -> Result<String, (DownloadError, u32)> {
        retry_with_policy(&self.retry_policy, &self.rate_limiter, url, move || {
            self.http.post_form_text(url, form)
        })
        .await
    }
}
