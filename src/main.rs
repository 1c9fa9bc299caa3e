//! CLI entry point for label-harvester.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use harvester_core::convert::{ConversionStage, LlamaParseConverter};
use harvester_core::download::ProgressObserver;
use harvester_core::pipeline::Pipeline;
use harvester_core::store::DocumentStore;
use serde::Serialize;
use tracing::{debug, info};

mod app_config;
mod cli;
mod progress;
mod settings;

use cli::{Cli, Command, GlobalArgs};
use progress::TransferBars;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if cli.global.quiet {
        "error"
    } else {
        match cli.global.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?cli, "CLI arguments parsed");

    let loaded = app_config::load_config(cli.global.config.as_deref())?;
    if let (Some(path), Some(_)) = (&loaded.path, &loaded.config) {
        info!(path = %path.display(), "loaded config file");
    }
    let file_config = loaded.config.as_ref();

    match &cli.command {
        Command::Scrape(args) => {
            let config = settings::pipeline_config(&cli.global, Some(args), file_config)?;
            let pipeline = Pipeline::new(config)?.with_observer(observer(&cli.global));
            let summary = pipeline.run().await?;
            report(&cli.global, &summary, || {
                format!(
                    "discovered {}, unresolved {}, downloaded {} ({} already present), not found {}, failed {}",
                    summary.discovered,
                    summary.unresolved,
                    summary.downloaded,
                    summary.already_present,
                    summary.skipped_not_found,
                    summary.failed
                )
            })?;
        }
        Command::Export(args) => {
            let config = settings::pipeline_config(&cli.global, None, file_config)?;
            let pipeline = Pipeline::new(config)?.with_observer(observer(&cli.global));
            let summary = pipeline.run_export(&args.csv).await?;
            report(&cli.global, &summary, || {
                format!(
                    "listed {}, unique {}, downloaded {} ({} already present), not found {}, failed {}",
                    summary.listed,
                    summary.unique,
                    summary.downloaded,
                    summary.already_present,
                    summary.skipped_not_found,
                    summary.failed
                )
            })?;
        }
        Command::Convert(args) => {
            let settings = settings::convert_settings(&cli.global, args, file_config)?;
            let converter = LlamaParseConverter::from_env(settings.llama_parse_base_url)?;
            let documents = DocumentStore::open(&settings.store_dir).await?;
            let output = DocumentStore::open(&settings.parsed_dir).await?;
            let summary = ConversionStage::new(documents, output, Arc::new(converter))
                .run()
                .await?;
            report(&cli.global, &summary, || {
                format!(
                    "found {}, converted {}, already converted {}, failed {}",
                    summary.found, summary.converted, summary.already_converted, summary.failed
                )
            })?;
        }
    }

    Ok(())
}

fn observer(global: &GlobalArgs) -> Arc<dyn ProgressObserver> {
    if global.quiet || global.no_progress || global.json {
        Arc::new(harvester_core::download::NoopProgress)
    } else {
        Arc::new(TransferBars::new())
    }
}

/// Prints the summary as JSON when requested, otherwise as one line unless quiet.
fn report<T: Serialize>(global: &GlobalArgs, summary: &T, line: impl FnOnce() -> String) -> Result<()> {
    if global.json {
        let json = serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
        println!("{json}");
    } else if !global.quiet {
        println!("{}", line());
    }
    Ok(())
}
