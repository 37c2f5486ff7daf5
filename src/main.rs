//! catalog-mirror main entry point
//!
//! This is the command-line interface for the incremental catalog mirror.

use anyhow::Context;
use catalog_mirror::catalog::DownloadDepth;
use catalog_mirror::config::{load_config, validate, Config, JsonFormatting};
use catalog_mirror::crawler::CrawlEngine;
use catalog_mirror::reports::{print_report, LeafCountVisitor, PageVisitor, ReportAggregator};
use catalog_mirror::CrawlSummary;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// catalog-mirror: an incremental mirror of a NuGet V3 catalog
///
/// Each run downloads the catalog documents committed since the previous
/// run and records a cursor so the next run resumes where this one stopped.
#[derive(Parser, Debug)]
#[command(name = "catalog-mirror")]
#[command(version)]
#[command(about = "An incremental NuGet catalog mirror", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Service index URL to mirror
    #[arg(long, value_name = "URL")]
    service_index_url: Option<String>,

    /// Directory that receives documents and cursors
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// How deep to mirror: ServiceIndex, CatalogIndex, CatalogPage or CatalogLeaf
    #[arg(long)]
    depth: Option<DownloadDepth>,

    /// How to write JSON: Unchanged or Pretty
    #[arg(long)]
    json_formatting: Option<JsonFormatting>,

    /// Stop after this many catalog pages
    #[arg(long, value_name = "N")]
    max_pages: Option<usize>,

    /// Stop after this many leaf items
    #[arg(long, value_name = "N")]
    max_commits: Option<usize>,

    /// Bucket page and leaf paths into nested directories
    #[arg(long)]
    format_paths: bool,

    /// Maximum concurrent leaf downloads
    #[arg(long, value_name = "N")]
    parallel_downloads: Option<usize>,

    /// Name prefix of the cursor file
    #[arg(long, value_name = "SUFFIX")]
    cursor_suffix: Option<String>,

    /// User-Agent header sent with every request
    #[arg(long, value_name = "AGENT")]
    user_agent: Option<String>,

    /// Report to compute from visited pages and print at the end
    #[arg(long, value_enum)]
    report: Option<ReportKind>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportKind {
    /// Leaf items per UTC hour
    LeafCount,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;
    tracing::info!(
        "Mirroring {} into {} (depth {})",
        config.source.service_index_url,
        config.output.data_dir.display(),
        config.download.depth
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after in-flight requests");
            interrupt.cancel();
        }
    });

    match cli.report {
        Some(ReportKind::LeafCount) => {
            let report = ReportAggregator::new(LeafCountVisitor::new());
            let mut engine = CrawlEngine::from_config_with_visitor(config, report, cancel)?;
            let summary = run(&mut engine).await?;
            print_summary(&summary);

            let report = engine.into_visitor();
            println!();
            print_report(report.name(), report.rows());
        }
        None => {
            let mut engine = CrawlEngine::from_config(config, cancel)?;
            let summary = run(&mut engine).await?;
            print_summary(&summary);
        }
    }

    Ok(())
}

async fn run<V: PageVisitor>(engine: &mut CrawlEngine<V>) -> anyhow::Result<CrawlSummary> {
    match engine.run().await {
        Ok(summary) => Ok(summary),
        Err(e) => {
            tracing::error!("Mirror run failed: {}", e);
            Err(e).context("mirror run failed")
        }
    }
}

/// Loads the config file, if any, and applies command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(url) = &cli.service_index_url {
        config.source.service_index_url = url.clone();
    }
    if let Some(user_agent) = &cli.user_agent {
        config.source.user_agent = Some(user_agent.clone());
    }
    if let Some(depth) = cli.depth {
        config.download.depth = depth;
    }
    if cli.max_pages.is_some() {
        config.download.max_pages = cli.max_pages;
    }
    if cli.max_commits.is_some() {
        config.download.max_commits = cli.max_commits;
    }
    if let Some(parallel) = cli.parallel_downloads {
        config.download.parallel_downloads = parallel;
    }
    if let Some(data_dir) = &cli.data_dir {
        config.output.data_dir = data_dir.clone();
    }
    if let Some(formatting) = cli.json_formatting {
        config.output.json_formatting = formatting;
    }
    if cli.format_paths {
        config.output.format_paths = true;
    }
    if let Some(suffix) = &cli.cursor_suffix {
        config.output.cursor_suffix = suffix.clone();
    }

    validate(&config).context("invalid configuration")?;
    Ok(config)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_mirror=info,warn"),
            1 => EnvFilter::new("catalog_mirror=debug,info"),
            2 => EnvFilter::new("catalog_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(summary: &CrawlSummary) {
    println!("=== Mirror Run ===\n");
    println!("  Depth: {}", summary.depth);
    println!("  Stopped: {}", summary.stop_reason);
    println!("  Pages processed: {}", summary.pages_processed);
    println!("  Items processed: {}", summary.items_processed);
    println!("  Leaves downloaded: {}", summary.leaves_downloaded);
    match summary.cursor {
        Some(cursor) => println!("  Cursor: {}", cursor),
        None => println!("  Cursor: (none)"),
    }
}
