//! Product detail page to document URL.

use tracing::{debug, instrument};

use super::client::PortalClient;
use super::error::PortalError;
use super::markup::find_document_href;
use super::{PortalConfig, ProductLink};
use crate::target::DownloadTarget;

/// Resolves product pages to their label document.
#[derive(Debug, Clone)]
pub struct DetailResolver {
    client: PortalClient,
    config: PortalConfig,
}

impl DetailResolver {
    /// Resolver matching anchors labelled `config.document_link_text`.
    #[must_use]
    pub fn new(client: PortalClient, config: PortalConfig) -> Self {
        Self { client, config }
    }

    /// Fetches the product page and returns the document target.
    ///
    /// Relative hrefs are joined against the portal base URL; the local file
    /// name is the last path segment of the resulting URL.
    ///
    /// # Errors
    ///
    /// - [`PortalError::DetailRequestFailed`] when the page cannot be fetched
    /// - [`PortalError::DocumentLinkNotFound`] when no anchor carries the label text
    /// - [`PortalError::UnusableDocumentUrl`] when the href yields no file name
    #[instrument(skip(self), fields(product = %link))]
    pub async fn resolve(&self, link: &ProductLink) -> Result<DownloadTarget, PortalError> {
        let html = self
            .client
            .get_page(link.url())
            .await
            .map_err(|(e, _)| PortalError::detail_request_failed(link.url().as_str(), e))?;

        let href = find_document_href(&html, &self.config.document_link_text)
            .ok_or_else(|| PortalError::document_link_not_found(link.url().as_str()))?;

        let target = self
            .config
            .base_url
            .join(&href)
            .ok()
            .and_then(DownloadTarget::from_document_url)
            .ok_or_else(|| PortalError::unusable_document_url(link.url().as_str(), &href))?;
        debug!(document = %target.url(), file = target.file_name(), "document link resolved");
        Ok(target)
    }
}
