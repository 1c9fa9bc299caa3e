//! Discovery against the label search portal.
//!
//! Three components share one cookie-carrying [`PortalClient`]:
//! - [`SessionResolver`] reads the session token from the search landing page
//! - [`SearchWalker`] pages through search results collecting [`ProductLink`]s
//! - [`DetailResolver`] turns a product page into a [`DownloadTarget`](crate::target::DownloadTarget)
//!
//! All markup assumptions are confined to [`markup`].

mod client;
mod detail;
mod error;
pub mod markup;
mod search;
mod session;

pub use client::PortalClient;
pub use detail::DetailResolver;
pub use error::PortalError;
pub use search::{SearchWalk, SearchWalker, WalkTermination};
pub use session::{SessionResolver, SessionToken};

use std::fmt;

use url::Url;

/// Portal root; relative links on portal pages resolve against it.
pub const DEFAULT_PORTAL_BASE_URL: &str = "https://portal.apvma.gov.au/";
/// Search landing page and form target.
pub const DEFAULT_SEARCH_URL: &str = "https://portal.apvma.gov.au/pubcris";
/// Portlet namespace used in search form field names.
pub const DEFAULT_PORTLET_ID: &str = "pubcrisportlet_WAR_pubcrisportlet";
/// Name of the hidden input carrying the session token.
pub const DEFAULT_TOKEN_FIELD: &str = "p_auth";
/// Class of the search results table.
pub const DEFAULT_RESULTS_TABLE_CLASS: &str = "search-results-table";
/// Visible text of the document anchor on product pages.
pub const DEFAULT_DOCUMENT_LINK_TEXT: &str = "e-label";
/// Results requested per search page.
pub const DEFAULT_PAGE_SIZE: u32 = 75;
/// Product type filter.
pub const DEFAULT_PRODUCT_TYPE: &str = "HERBICIDE";

/// Where the portal lives and what its pages look like.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Base for resolving relative links.
    pub base_url: Url,
    /// Landing page (GET, token source) and search form target (POST).
    pub search_url: Url,
    /// Portlet namespace prefixed to search form fields.
    pub portlet_id: String,
    /// Hidden input holding the session token.
    pub token_field: String,
    /// Class identifying the results table.
    pub results_table_class: String,
    /// Visible text of the document anchor.
    pub document_link_text: String,
}

impl PortalConfig {
    /// Config for a portal at `base_url` searched through `search_url`, with the
    /// default page structure.
    #[must_use]
    pub fn new(base_url: Url, search_url: Url) -> Self {
        Self {
            base_url,
            search_url,
            portlet_id: DEFAULT_PORTLET_ID.to_string(),
            token_field: DEFAULT_TOKEN_FIELD.to_string(),
            results_table_class: DEFAULT_RESULTS_TABLE_CLASS.to_string(),
            document_link_text: DEFAULT_DOCUMENT_LINK_TEXT.to_string(),
        }
    }

    /// Config for the production portal.
    ///
    /// # Errors
    ///
    /// Never in practice; the default URLs are constants.
    pub fn production() -> Result<Self, url::ParseError> {
        Ok(Self::new(
            Url::parse(DEFAULT_PORTAL_BASE_URL)?,
            Url::parse(DEFAULT_SEARCH_URL)?,
        ))
    }
}

/// Search filter. Every field is fixed for a walk; only the page number varies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Product type filter (e.g. `HERBICIDE`).
    pub product_type: String,
    /// Free-text keywords; empty for an unfiltered listing.
    pub keywords: String,
    /// Results per page.
    pub page_size: u32,
    /// Sort column.
    pub order_by_col: String,
    /// Sort direction (`asc` / `desc`).
    pub order_by_type: String,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            product_type: DEFAULT_PRODUCT_TYPE.to_string(),
            keywords: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            order_by_col: "name".to_string(),
            order_by_type: "asc".to_string(),
        }
    }
}

impl SearchCriteria {
    /// Form fields for one search page POST.
    #[must_use]
    pub fn form_fields(
        &self,
        portal: &PortalConfig,
        token: &SessionToken,
        page: u32,
    ) -> Vec<(String, String)> {
        let portlet_id = portal.portlet_id.as_str();
        let ns = |name: &str| format!("_{portlet_id}_{name}");
        vec![
            (portal.token_field.clone(), token.as_str().to_string()),
            ("p_p_id".to_string(), portlet_id.to_string()),
            ("p_p_lifecycle".to_string(), "1".to_string()),
            ("p_p_state".to_string(), "normal".to_string()),
            ("p_p_mode".to_string(), "view".to_string()),
            ("p_p_col_id".to_string(), "column-1".to_string()),
            ("p_p_col_pos".to_string(), "2".to_string()),
            ("p_p_col_count".to_string(), "4".to_string()),
            (ns("javax.portlet.action"), "search".to_string()),
            (ns("cur"), page.to_string()),
            (ns("delta"), self.page_size.to_string()),
            (ns("keywords"), self.keywords.clone()),
            (ns("productType"), self.product_type.clone()),
            (ns("orderByCol"), self.order_by_col.clone()),
            (ns("orderByType"), self.order_by_type.clone()),
        ]
    }
}

/// A product detail page, identified by its normalized absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProductLink(Url);

impl ProductLink {
    /// Resolves `href` against `base`, dropping any fragment.
    ///
    /// Returns `None` for hrefs that do not form an http(s) URL.
    #[must_use]
    pub fn resolve(base: &Url, href: &str) -> Option<Self> {
        let mut url = base.join(href.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        url.set_fragment(None);
        Some(Self(url))
    }

    /// The detail page URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for ProductLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
