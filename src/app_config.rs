//! Optional TOML configuration file for CLI defaults.
//!
//! Precedence is command line, then file, then built-in defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use url::Url;

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Directory the label PDFs are stored in.
    pub store_dir: Option<PathBuf>,
    /// Directory converted markdown is written to.
    pub parsed_dir: Option<PathBuf>,
    /// Portal root used to resolve relative links.
    pub portal_base_url: Option<String>,
    /// Search landing page and form target.
    pub search_url: Option<String>,
    /// Base URL of `<No>ELBL.pdf` documents for export runs.
    pub elabel_base_url: Option<String>,
    /// Product type search filter.
    pub product_type: Option<String>,
    /// Results per search page (1..=500).
    pub page_size: Option<u32>,
    /// Search page cap.
    pub max_pages: Option<u32>,
    /// Products processed at once (same range as CLI).
    pub concurrency: Option<u8>,
    /// Retries after the first attempt (0..=10).
    pub max_retries: Option<u8>,
    /// Per-host minimum request spacing in milliseconds.
    pub rate_limit_ms: Option<u64>,
    /// Download client connect timeout in seconds.
    pub download_connect_timeout_secs: Option<u64>,
    /// Download client read timeout in seconds.
    pub download_read_timeout_secs: Option<u64>,
    /// Portal client connect timeout in seconds.
    pub portal_connect_timeout_secs: Option<u64>,
    /// Portal client read timeout in seconds.
    pub portal_read_timeout_secs: Option<u64>,
    /// Root of the parsing service API.
    pub llama_parse_base_url: Option<String>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=16).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=16");
        }
        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 0..=10");
        }
        if let Some(rate_limit) = self.rate_limit_ms
            && rate_limit > 60_000
        {
            bail!(
                "Invalid config value for `rate_limit_ms`: {rate_limit}. Expected range: 0..=60000"
            );
        }
        if let Some(page_size) = self.page_size
            && !(1..=500).contains(&page_size)
        {
            bail!("Invalid config value for `page_size`: {page_size}. Expected range: 1..=500");
        }
        if self.max_pages == Some(0) {
            bail!("Invalid config value for `max_pages`: 0. Expected at least 1");
        }
        if self
            .product_type
            .as_deref()
            .is_some_and(|value| value.trim().is_empty())
        {
            bail!("Invalid config value for `product_type`: must not be empty");
        }

        validate_timeout_secs(
            "download_connect_timeout_secs",
            self.download_connect_timeout_secs,
        )?;
        validate_timeout_secs(
            "download_read_timeout_secs",
            self.download_read_timeout_secs,
        )?;
        validate_timeout_secs(
            "portal_connect_timeout_secs",
            self.portal_connect_timeout_secs,
        )?;
        validate_timeout_secs("portal_read_timeout_secs", self.portal_read_timeout_secs)?;

        validate_url("portal_base_url", self.portal_base_url.as_deref())?;
        validate_url("search_url", self.search_url.as_deref())?;
        validate_url("elabel_base_url", self.elabel_base_url.as_deref())?;
        validate_url("llama_parse_base_url", self.llama_parse_base_url.as_deref())?;

        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

fn validate_url(field: &str, value: Option<&str>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    let url = Url::parse(value)
        .with_context(|| format!("Invalid config value for `{field}`: '{value}' is not a URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Invalid config value for `{field}`: '{value}' must be an http(s) URL");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Path that was consulted, if one could be determined.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/label-harvester/config.toml`
/// 2. `$HOME/.config/label-harvester/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("label-harvester")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("label-harvester")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit` (which must exist) or from the default
/// path when present.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig::default());
    };
    if !path_ref.exists() {
        return Ok(LoadedConfig { path, config: None });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let cfg: FileConfig = toml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}
