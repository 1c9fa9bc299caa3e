//! Effective run settings: command line over config file over defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use harvester_core::convert::DEFAULT_LLAMA_PARSE_BASE_URL;
use harvester_core::download::DEFAULT_MAX_RETRIES;
use harvester_core::download::constants::DEFAULT_RATE_LIMIT_MS;
use harvester_core::pipeline::{DEFAULT_CONCURRENCY, DEFAULT_ELABEL_BASE_URL, PipelineConfig};
use harvester_core::portal::{DEFAULT_PORTAL_BASE_URL, DEFAULT_SEARCH_URL, PortalConfig};
use url::Url;

use crate::app_config::FileConfig;
use crate::cli::{ConvertArgs, GlobalArgs, ScrapeArgs};

const DEFAULT_STORE_DIR: &str = "data/labels";
const DEFAULT_PARSED_DIR: &str = "data/parsed";

/// Builds the pipeline configuration for `scrape` and `export`.
pub(crate) fn pipeline_config(
    global: &GlobalArgs,
    scrape: Option<&ScrapeArgs>,
    file: Option<&FileConfig>,
) -> Result<PipelineConfig> {
    let file = file.cloned().unwrap_or_default();

    let portal_base = parse_url(
        "portal_base_url",
        file.portal_base_url.as_deref(),
        DEFAULT_PORTAL_BASE_URL,
    )?;
    let search_url = parse_url("search_url", file.search_url.as_deref(), DEFAULT_SEARCH_URL)?;
    let elabel_base = parse_url(
        "elabel_base_url",
        file.elabel_base_url.as_deref(),
        DEFAULT_ELABEL_BASE_URL,
    )?;

    let store_dir = global
        .store_dir
        .clone()
        .or(file.store_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));
    let mut config = PipelineConfig::new(
        store_dir,
        PortalConfig::new(portal_base, search_url),
        elabel_base,
    );

    if let Some(product_type) = scrape
        .and_then(|s| s.product_type.clone())
        .or(file.product_type)
    {
        config.criteria.product_type = product_type;
    }
    if let Some(page_size) = file.page_size {
        config.criteria.page_size = page_size;
    }
    config.max_pages = scrape.and_then(|s| s.max_pages).or(file.max_pages);

    config.concurrency = global
        .concurrency
        .or(file.concurrency)
        .map_or(DEFAULT_CONCURRENCY, usize::from);
    config.max_retries = global
        .max_retries
        .or(file.max_retries)
        .map_or(DEFAULT_MAX_RETRIES, u32::from);
    config.rate_limit = Duration::from_millis(
        global
            .rate_limit
            .or(file.rate_limit_ms)
            .unwrap_or(DEFAULT_RATE_LIMIT_MS),
    );

    if let Some(secs) = file.download_connect_timeout_secs {
        config.download_connect_timeout_secs = secs;
    }
    if let Some(secs) = file.download_read_timeout_secs {
        config.download_read_timeout_secs = secs;
    }
    if let Some(secs) = file.portal_connect_timeout_secs {
        config.portal_connect_timeout_secs = secs;
    }
    if let Some(secs) = file.portal_read_timeout_secs {
        config.portal_read_timeout_secs = secs;
    }

    Ok(config)
}

/// Directories and service root for `convert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConvertSettings {
    pub(crate) store_dir: PathBuf,
    pub(crate) parsed_dir: PathBuf,
    pub(crate) llama_parse_base_url: Url,
}

pub(crate) fn convert_settings(
    global: &GlobalArgs,
    args: &ConvertArgs,
    file: Option<&FileConfig>,
) -> Result<ConvertSettings> {
    let file = file.cloned().unwrap_or_default();
    Ok(ConvertSettings {
        store_dir: global
            .store_dir
            .clone()
            .or(file.store_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR)),
        parsed_dir: args
            .parsed_dir
            .clone()
            .or(file.parsed_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PARSED_DIR)),
        llama_parse_base_url: parse_url(
            "llama_parse_base_url",
            file.llama_parse_base_url.as_deref(),
            DEFAULT_LLAMA_PARSE_BASE_URL,
        )?,
    })
}

fn parse_url(field: &str, configured: Option<&str>, default: &str) -> Result<Url> {
    let raw = configured.unwrap_or(default);
    Url::parse(raw).with_context(|| format!("Invalid `{field}`: '{raw}'"))
}
