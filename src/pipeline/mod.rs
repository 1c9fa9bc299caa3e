//! Run orchestration.
//!
//! A scrape run sequences session → search walk → detail resolution →
//! download. Product-level work runs on a bounded pool of tasks: each task
//! resolves one product page and fetches its document. Only a store that
//! cannot be opened or a session that cannot be started aborts the run; every
//! other failure is counted in the [`RunSummary`].
//!
//! An export run skips discovery and feeds the targets derived from a results
//! export through the same fetch path.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::pipeline::{Pipeline, PipelineConfig};
//! use harvester_core::portal::PortalConfig;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::new(
//!     "data/labels",
//!     PortalConfig::production()?,
//!     Url::parse("https://elabels.apvma.gov.au/")?,
//! );
//! let summary = Pipeline::new(config)?.run().await?;
//! println!("{} discovered, {} downloaded", summary.discovered, summary.downloaded);
//! # Ok(())
//! # }
//! ```

mod error;
mod summary;

pub use error::{MAX_CONCURRENCY, MIN_CONCURRENCY, PipelineError};
pub use summary::{ExportSummary, RunSummary};

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::download::constants::{
    DEFAULT_RATE_LIMIT_MS, DOWNLOAD_CONNECT_TIMEOUT_SECS, DOWNLOAD_READ_TIMEOUT_SECS,
    PORTAL_CONNECT_TIMEOUT_SECS, PORTAL_READ_TIMEOUT_SECS,
};
use crate::download::{
    DEFAULT_MAX_RETRIES, DownloadManager, HttpClient, NoopProgress, ProgressObserver,
    RateLimiter, RetryPolicy,
};
use crate::export;
use crate::portal::{
    DetailResolver, PortalClient, PortalConfig, SearchCriteria, SearchWalker, SessionResolver,
};
use crate::store::DocumentStore;
use crate::target::DownloadTarget;
use summary::{OutcomeKind, OutcomeStats};

/// Default number of products processed concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Base URL of the e-label document host used by export runs.
pub const DEFAULT_ELABEL_BASE_URL: &str = "https://elabels.apvma.gov.au/";

/// Everything a run needs to know.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Document store directory; created when missing.
    pub store_dir: PathBuf,
    /// Portal location and page structure.
    pub portal: PortalConfig,
    /// Search filter.
    pub criteria: SearchCriteria,
    /// Page cap for the search walk; `None` walks until a termination condition.
    pub max_pages: Option<u32>,
    /// Base for `<No>ELBL.pdf` URLs in export runs.
    pub elabel_base_url: Url,
    /// Products processed at once.
    pub concurrency: usize,
    /// Retries after the first attempt for fetches and portal pages.
    pub max_retries: u32,
    /// Minimum delay between requests to one host; zero disables pacing.
    pub rate_limit: Duration,
    /// Download client connect timeout, seconds.
    pub download_connect_timeout_secs: u64,
    /// Download client total timeout, seconds.
    pub download_read_timeout_secs: u64,
    /// Portal client connect timeout, seconds.
    pub portal_connect_timeout_secs: u64,
    /// Portal client total timeout, seconds.
    pub portal_read_timeout_secs: u64,
}

impl PipelineConfig {
    /// Config with default criteria, concurrency, retry and pacing settings.
    #[must_use]
    pub fn new(store_dir: impl Into<PathBuf>, portal: PortalConfig, elabel_base_url: Url) -> Self {
        Self {
            store_dir: store_dir.into(),
            portal,
            criteria: SearchCriteria::default(),
            max_pages: None,
            elabel_base_url,
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            rate_limit: Duration::from_millis(DEFAULT_RATE_LIMIT_MS),
            download_connect_timeout_secs: DOWNLOAD_CONNECT_TIMEOUT_SECS,
            download_read_timeout_secs: DOWNLOAD_READ_TIMEOUT_SECS,
            portal_connect_timeout_secs: PORTAL_CONNECT_TIMEOUT_SECS,
            portal_read_timeout_secs: PORTAL_READ_TIMEOUT_SECS,
        }
    }
}

/// Drives scrape and export runs.
pub struct Pipeline {
    config: PipelineConfig,
    retry_policy: RetryPolicy,
    rate_limiter: Arc<RateLimiter>,
    observer: Arc<dyn ProgressObserver>,
}

impl Pipeline {
    /// Creates a pipeline reporting no progress.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConcurrency`] if `config.concurrency`
    /// is outside [`MIN_CONCURRENCY`]..=[`MAX_CONCURRENCY`].
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&config.concurrency) {
            return Err(PipelineError::InvalidConcurrency {
                value: config.concurrency,
            });
        }
        let retry_policy = RetryPolicy::with_max_retries(config.max_retries);
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit));
        Ok(Self {
            config,
            retry_policy,
            rate_limiter,
            observer: Arc::new(NoopProgress),
        })
    }

    /// Reports transfer progress to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the retry policy derived from `max_retries`.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Scrapes the portal and fetches every label it links to.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Store`] if the store directory cannot be created
    /// - [`PipelineError::Session`] if no session token can be obtained
    /// - [`PipelineError::Client`] if an HTTP client cannot be built
    #[instrument(skip(self), fields(store = %self.config.store_dir.display()))]
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let store = self.open_store().await?;
        let fetcher = self.fetcher(store)?;

        let portal_client = PortalClient::with_timeouts(
            self.config.portal_connect_timeout_secs,
            self.config.portal_read_timeout_secs,
            self.retry_policy.clone(),
            Arc::clone(&self.rate_limiter),
        )
        .map_err(PipelineError::Client)?;
        let portal = &self.config.portal;

        let token = SessionResolver::new(portal_client.clone(), portal.token_field.clone())
            .resolve(&portal.search_url)
            .await
            .map_err(PipelineError::Session)?;

        let walk = SearchWalker::new(portal_client.clone(), portal.clone())
            .walk(&token, &self.config.criteria, self.config.max_pages)
            .await;
        let discovered = walk.links.len();
        info!(discovered, pages = walk.pages_fetched, "discovery complete");

        let resolver = Arc::new(DetailResolver::new(portal_client, portal.clone()));
        run_bounded(self.config.concurrency, walk.links, |link| {
            let resolver = Arc::clone(&resolver);
            let fetcher = fetcher.clone();
            async move {
                match resolver.resolve(&link).await {
                    Ok(target) => fetcher.fetch(target).await,
                    Err(e) => {
                        warn!(product = %link, error = %e, "skipping product");
                        fetcher.stats.record_unresolved();
                    }
                }
            }
        })
        .await?;

        let summary = fetcher.stats.run_summary(discovered);
        info!(
            discovered = summary.discovered,
            unresolved = summary.unresolved,
            downloaded = summary.downloaded,
            already_present = summary.already_present,
            not_found = summary.skipped_not_found,
            failed = summary.failed,
            "scrape run complete"
        );
        Ok(summary)
    }

    /// Fetches the labels listed in a results export, one per distinct
    /// active-ingredient string.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Store`] if the store directory cannot be created
    /// - [`PipelineError::Export`] if the export cannot be read or parsed
    /// - [`PipelineError::Client`] if the HTTP client cannot be built
    #[instrument(skip(self, export_path), fields(export = %export_path.display()))]
    pub async fn run_export(&self, export_path: &Path) -> Result<ExportSummary, PipelineError> {
        let products = export::read_export(export_path).await?;
        let listed = products.len();
        let unique = export::dedup_by_actives(products);
        let targets = export::targets_for(&unique, &self.config.elabel_base_url);
        info!(listed, unique = unique.len(), targets = targets.len(), "export loaded");

        let store = self.open_store().await?;
        let fetcher = self.fetcher(store)?;
        run_bounded(self.config.concurrency, targets, |target| {
            let fetcher = fetcher.clone();
            async move { fetcher.fetch(target).await }
        })
        .await?;

        let summary = fetcher.stats.export_summary(listed, unique.len());
        info!(
            listed = summary.listed,
            unique = summary.unique,
            downloaded = summary.downloaded,
            already_present = summary.already_present,
            not_found = summary.skipped_not_found,
            failed = summary.failed,
            "export run complete"
        );
        Ok(summary)
    }

    async fn open_store(&self) -> Result<DocumentStore, PipelineError> {
        let store = DocumentStore::open(&self.config.store_dir).await?;
        match store.sweep_partials().await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "removed partial files from an earlier run"),
            Err(e) => warn!(error = %e, "could not sweep partial files"),
        }
        Ok(store)
    }

    fn fetcher(&self, store: DocumentStore) -> Result<Fetcher, PipelineError> {
        let client = HttpClient::with_timeouts(
            self.config.download_connect_timeout_secs,
            self.config.download_read_timeout_secs,
            None,
        )
        .map_err(PipelineError::Client)?;
        let manager = DownloadManager::new(
            client,
            store,
            self.retry_policy.clone(),
            Arc::clone(&self.rate_limiter),
        );
        Ok(Fetcher {
            manager,
            claims: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(OutcomeStats::default()),
            observer: Arc::clone(&self.observer),
        })
    }
}

/// Per-run fetch state shared by all tasks.
///
/// A file name is claimed before its fetch starts, so two products pointing at
/// the same document are fetched once per run. Later claimants wait for that
/// fetch and are counted with its classification.
#[derive(Clone)]
struct Fetcher {
    manager: DownloadManager,
    claims: Arc<Mutex<HashMap<String, Arc<OnceCell<OutcomeKind>>>>>,
    stats: Arc<OutcomeStats>,
    observer: Arc<dyn ProgressObserver>,
}

impl Fetcher {
    async fn fetch(&self, target: DownloadTarget) {
        let name = target.file_name().to_string();
        let cell = self.claim(&name);
        let mut fetched_here = false;
        let ran = &mut fetched_here;
        let kind = *cell
            .get_or_init(|| async move {
                *ran = true;
                let outcome = self.manager.fetch(&target, self.observer.as_ref()).await;
                OutcomeKind::from(&outcome)
            })
            .await;

        if fetched_here {
            self.stats.record(kind);
        } else {
            debug!(file = %name, ?kind, "file name already claimed in this run");
            self.stats.record_duplicate(kind);
        }
    }

    fn claim(&self, name: &str) -> Arc<OnceCell<OutcomeKind>> {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(claims.entry(name.to_string()).or_default())
    }
}

/// Runs `task` for every item with at most `concurrency` tasks in flight.
async fn run_bounded<I, F, Fut>(concurrency: usize, items: I, task: F) -> Result<(), PipelineError>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut handles = Vec::new();

    for item in items {
        // Blocks while `concurrency` tasks are running
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|_| PipelineError::SemaphoreClosed)?;
        let work = task(item);
        handles.push(tokio::spawn(async move {
            let _permit = permit;
            work.await;
        }));
    }

    debug!(task_count = handles.len(), "waiting for tasks to complete");
    for handle in handles {
        // A panicking task is logged; the rest of the run still completes
        if let Err(e) = handle.await {
            warn!(error = %e, "pipeline task panicked");
        }
    }
    Ok(())
}
