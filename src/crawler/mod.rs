//! Crawler module for mirroring the catalog
//!
//! This module contains the core mirroring logic, including:
//! - HTTP fetching through the `CatalogClient` collaborator
//! - The bounded leaf download pool
//! - Commit-group processing of catalog pages
//! - Overall run orchestration and cursor advancement

mod client;
mod engine;
mod leaf_fetcher;
mod page_processor;

pub use client::{
    build_http_client, default_user_agent, fetch_cancellable, CatalogClient, FetchedDocument,
    HttpCatalogClient,
};
pub use engine::{CrawlEngine, CrawlSummary, StopReason};
pub use leaf_fetcher::{LeafFetcher, LeafResult};
pub use page_processor::{CommitBudget, PageOutcome, PageProcessor, PageWindow};

use crate::config::Config;
use crate::Result;
use tokio_util::sync::CancellationToken;

/// Runs one mirror pass with the default collaborators
///
/// This is the main entry point for mirroring. It will:
/// 1. Validate the configuration
/// 2. Build the HTTP client and the file stores under the data directory
/// 3. Fetch the service index and catalog index
/// 4. Process every catalog page newer than the stored cursor
///
/// # Arguments
///
/// * `config` - The mirror configuration
/// * `cancel` - Cancels the run
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - The run completed or stopped at a configured limit
/// * `Err(CatalogError)` - The run failed; the cursor holds the last safe value
pub async fn run_crawl(config: Config, cancel: CancellationToken) -> Result<CrawlSummary> {
    CrawlEngine::from_config(config, cancel)?.run().await
}
