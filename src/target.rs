//! Download list entries and per-entry outcomes.

use std::fmt;
use std::path::PathBuf;

use url::Url;

use crate::download::{DownloadError, file_name_from_url, product_label_file_name};

/// A resolved document URL paired with the store file name it lands under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadTarget {
    url: Url,
    file_name: String,
}

impl DownloadTarget {
    /// Creates a target with an explicit file name.
    #[must_use]
    pub fn new(url: Url, file_name: impl Into<String>) -> Self {
        Self {
            url,
            file_name: file_name.into(),
        }
    }

    /// Target named after the last path segment of `url`.
    ///
    /// Returns `None` when the URL has no usable final segment.
    #[must_use]
    pub fn from_document_url(url: Url) -> Option<Self> {
        let file_name = file_name_from_url(&url)?;
        Some(Self { url, file_name })
    }

    /// Target for a product identifier on the e-label host: `<base><id>ELBL.pdf`.
    ///
    /// Returns `None` for a blank identifier or one that does not join onto `base`.
    #[must_use]
    pub fn for_product_id(elabel_base: &Url, product_id: &str) -> Option<Self> {
        let file_name = product_label_file_name(product_id)?;
        let url = elabel_base.join(&file_name).ok()?;
        Some(Self { url, file_name })
    }

    /// Document URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Local file name in the document store.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl fmt::Display for DownloadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.url, self.file_name)
    }
}

/// Result of fetching one [`DownloadTarget`].
#[derive(Debug)]
pub enum DownloadOutcome {
    /// The document is in the store.
    Success {
        /// Final path in the store.
        path: PathBuf,
        /// Bytes transferred; zero when no network call was made.
        bytes: u64,
        /// False when the document was already present and nothing was fetched.
        fetched: bool,
    },
    /// The server answered 404: no label is filed for this product.
    NotFound {
        /// The URL that returned 404.
        url: String,
    },
    /// Network, HTTP or IO failure after all attempts.
    Failed {
        /// The last error seen.
        error: DownloadError,
        /// Number of attempts made.
        attempts: u32,
    },
}

impl DownloadOutcome {
    /// True for [`DownloadOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// True when the outcome was satisfied from the store without a request.
    #[must_use]
    pub fn was_already_present(&self) -> bool {
        matches!(self, Self::Success { fetched: false, .. })
    }
}
