//! Error types for portal discovery.

use thiserror::Error;

use crate::download::DownloadError;

/// Errors raised while talking to the search portal.
///
/// Only [`PortalError::AuthTokenMissing`] is fatal to a run. The others are
/// caught at the page or product boundary, logged and counted.
#[derive(Debug, Error)]
pub enum PortalError {
    /// The landing page could not be fetched or carries no session token.
    #[error("no session token from {url}: {reason}")]
    AuthTokenMissing {
        /// Landing page URL.
        url: String,
        /// What went wrong.
        reason: String,
        /// Transport failure, when the request itself failed.
        #[source]
        source: Option<DownloadError>,
    },

    /// A search results page request failed after retries.
    #[error("search request for page {page} failed: {source}")]
    SearchRequestFailed {
        /// Page number that failed.
        page: u32,
        /// The underlying transport error.
        #[source]
        source: DownloadError,
    },

    /// The product detail page has no document anchor.
    #[error("no document link on product page {url}")]
    DocumentLinkNotFound {
        /// Product detail page URL.
        url: String,
    },

    /// The product detail page could not be fetched after retries.
    #[error("product page {url} could not be fetched: {source}")]
    DetailRequestFailed {
        /// Product detail page URL.
        url: String,
        /// The underlying transport error.
        #[source]
        source: DownloadError,
    },

    /// The document anchor's href does not yield a URL with a file name.
    #[error("document link '{href}' on {url} is not a usable document URL")]
    UnusableDocumentUrl {
        /// Product detail page URL.
        url: String,
        /// The raw href found on the page.
        href: String,
    },
}

impl PortalError {
    /// Token field absent from otherwise fetched markup.
    pub fn token_field_absent(url: impl Into<String>, field: &str) -> Self {
        Self::AuthTokenMissing {
            url: url.into(),
            reason: format!("hidden field '{field}' not found; the page structure may have changed"),
            source: None,
        }
    }

    /// Landing page request failed.
    pub fn token_request_failed(url: impl Into<String>, source: DownloadError) -> Self {
        Self::AuthTokenMissing {
            url: url.into(),
            reason: "landing page request failed".to_string(),
            source: Some(source),
        }
    }

    /// Creates a `SearchRequestFailed` error.
    pub fn search_request_failed(page: u32, source: DownloadError) -> Self {
        Self::SearchRequestFailed { page, source }
    }

    /// Creates a `DocumentLinkNotFound` error.
    pub fn document_link_not_found(url: impl Into<String>) -> Self {
        Self::DocumentLinkNotFound { url: url.into() }
    }

    /// Creates a `DetailRequestFailed` error.
    pub fn detail_request_failed(url: impl Into<String>, source: DownloadError) -> Self {
        Self::DetailRequestFailed {
            url: url.into(),
            source,
        }
    }

    /// Creates an `UnusableDocumentUrl` error.
    pub fn unusable_document_url(url: impl Into<String>, href: impl Into<String>) -> Self {
        Self::UnusableDocumentUrl {
            url: url.into(),
            href: href.into(),
        }
    }
}
