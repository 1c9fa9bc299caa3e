//! Paginated search walk.
//!
//! Pages are requested strictly in sequence: the server keys pagination state
//! to the session, so page N+1 is only requested after page N was parsed.
//!
//! ```text
//! Requesting(1) -> Parsing -> Requesting(2) -> ... -> Terminated
//! ```
//!
//! The walk ends at the first of: no results table, a header-only table, a
//! page after the first adding no new links, the page cap. A request that
//! still fails after retries also ends it, keeping the links gathered so far.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument, warn};

use super::client::PortalClient;
use super::error::PortalError;
use super::markup::{ResultsPage, parse_results_page};
use super::session::SessionToken;
use super::{PortalConfig, ProductLink, SearchCriteria};

/// Why a walk stopped.
#[derive(Debug)]
pub enum WalkTermination {
    /// The page had no results table.
    NoResultsTable,
    /// The results table held only its header row.
    HeaderOnly,
    /// A page after the first added no new links.
    NoNewLinks,
    /// The configured page cap was reached.
    PageCapReached,
    /// A page request failed after retries.
    RequestFailed(PortalError),
}

/// Links found by a walk and how it ended.
#[derive(Debug)]
pub struct SearchWalk {
    /// Distinct product links across all pages.
    pub links: BTreeSet<ProductLink>,
    /// Pages whose results were received.
    pub pages_fetched: u32,
    /// Which termination condition fired.
    pub termination: WalkTermination,
}

/// Drives the search form across result pages.
#[derive(Debug, Clone)]
pub struct SearchWalker {
    client: PortalClient,
    config: PortalConfig,
}

impl SearchWalker {
    /// Walker posting to `config.search_url`.
    #[must_use]
    pub fn new(client: PortalClient, config: PortalConfig) -> Self {
        Self { client, config }
    }

    /// Walks result pages from page 1, collecting product links.
    ///
    /// `max_pages` of `Some(0)` is treated as one page. Never fails: a request
    /// failure is reported through [`WalkTermination::RequestFailed`].
    #[instrument(skip(self, token, criteria), fields(product_type = %criteria.product_type))]
    pub async fn walk(
        &self,
        token: &SessionToken,
        criteria: &SearchCriteria,
        max_pages: Option<u32>,
    ) -> SearchWalk {
        let cap = max_pages.map(|n| n.max(1));
        let mut links = BTreeSet::new();
        let mut page = 1_u32;
        let mut pages_fetched = 0_u32;

        let termination = loop {
            let form = criteria.form_fields(&self.config, token, page);
            let html = match self.client.post_page(&self.config.search_url, &form).await {
                Ok(html) => html,
                Err((error, attempts)) => {
                    warn!(page, attempts, error = %error, "search request failed, keeping partial results");
                    break WalkTermination::RequestFailed(PortalError::search_request_failed(
                        page, error,
                    ));
                }
            };
            pages_fetched += 1;

            let hrefs = match parse_results_page(&html, &self.config.results_table_class) {
                ResultsPage::NoTable => {
                    debug!(page, "no results table");
                    break WalkTermination::NoResultsTable;
                }
                ResultsPage::HeaderOnly => {
                    debug!(page, "results table has no data rows");
                    break WalkTermination::HeaderOnly;
                }
                ResultsPage::Rows(hrefs) => hrefs,
            };

            let mut new_links = 0_usize;
            for href in &hrefs {
                match ProductLink::resolve(&self.config.base_url, href) {
                    Some(link) => {
                        if links.insert(link) {
                            new_links += 1;
                        }
                    }
                    None => debug!(page, href = %href, "ignoring unusable product href"),
                }
            }
            info!(page, rows = hrefs.len(), new_links, total = links.len(), "search page parsed");

            if new_links == 0 && page > 1 {
                break WalkTermination::NoNewLinks;
            }
            if cap.is_some_and(|cap| page >= cap) {
                break WalkTermination::PageCapReached;
            }
            page += 1;
        };

        info!(links = links.len(), pages_fetched, termination = ?termination, "search walk finished");
        SearchWalk {
            links,
            pages_fetched,
            termination,
        }
    }
}
