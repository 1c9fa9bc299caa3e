//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Discover, download and convert regulatory product labels.
///
/// Label Harvester walks the registration portal's search results, resolves
/// each product's e-label document and keeps a local store of the PDFs,
/// optionally converting them to markdown.
#[derive(Parser, Debug)]
#[command(name = "label-harvester")]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags accepted by every subcommand.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/label-harvester/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Directory label PDFs are stored in (default: data/labels)
    #[arg(long, value_name = "DIR", global = true)]
    pub store_dir: Option<PathBuf>,

    /// Products processed concurrently (1-16, default 4)
    #[arg(short = 'c', long, global = true, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub concurrency: Option<u8>,

    /// Retries after the first attempt for transient failures (0-10, default 2)
    #[arg(short = 'r', long, global = true, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: Option<u8>,

    /// Minimum delay between requests to the same host in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, value_name = "MS", global = true, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit: Option<u64>,

    /// Print the run summary as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Walk the portal search and download every e-label found
    Scrape(ScrapeArgs),

    /// Download the e-labels listed in a portal results export (CSV)
    Export(ExportArgs),

    /// Convert stored PDFs to markdown with LlamaParse (needs LLAMA_CLOUD_API_KEY)
    Convert(ConvertArgs),
}

/// `scrape` options.
#[derive(ClapArgs, Debug, Default)]
pub struct ScrapeArgs {
    /// Stop the search walk after this many result pages
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_pages: Option<u32>,

    /// Product type filter (default: HERBICIDE)
    #[arg(long, value_name = "TYPE")]
    pub product_type: Option<String>,
}

/// `export` options.
#[derive(ClapArgs, Debug)]
pub struct ExportArgs {
    /// Results export with `No` and `Actives` columns
    #[arg(value_name = "CSV")]
    pub csv: PathBuf,
}

/// `convert` options.
#[derive(ClapArgs, Debug, Default)]
pub struct ConvertArgs {
    /// Directory markdown is written to (default: data/parsed)
    #[arg(long, value_name = "DIR")]
    pub parsed_dir: Option<PathBuf>,
}
