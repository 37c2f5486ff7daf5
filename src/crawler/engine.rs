//! Crawl engine - top-level mirror orchestration
//!
//! A run walks the catalog hierarchy from the top:
//! - Fetch and store the service index
//! - Fetch and store the catalog index it points to
//! - Select the pages newer than the cursor
//! - Process pages in commit order, persisting the cursor after each one
//!
//! The cursor only ever moves to the timestamp of a commit batch that is
//! fully processed and known to be closed. A batch is closed once the index
//! lists a newer commit for its page or the index has no further pages.
//! Items newer than the commit the index lists for their page are left for
//! a later run.

use crate::catalog::{
    decode, CatalogIndex, CatalogPage, DownloadDepth, PageRef, ServiceIndex, Timestamp,
};
use crate::config::{validate, Config};
use crate::crawler::client::{fetch_cancellable, CatalogClient, HttpCatalogClient};
use crate::crawler::leaf_fetcher::LeafFetcher;
use crate::crawler::page_processor::{CommitBudget, PageProcessor, PageWindow};
use crate::reports::{NullVisitor, PageVisitor};
use crate::storage::{
    resource_directory, resource_path, CursorStore, DocumentStore, FileCursorStore,
    FileDocumentStore, PathFormatter,
};
use crate::{CatalogError, ConfigError, Result};
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured depth does not include catalog pages
    DepthReached,
    /// Every page newer than the cursor was processed
    FeedExhausted,
    /// `max-pages` was reached with pages left
    MaxPages,
    /// `max-commits` was reached with items left
    MaxCommits,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DepthReached => "depth reached",
            Self::FeedExhausted => "feed exhausted",
            Self::MaxPages => "max pages reached",
            Self::MaxCommits => "max commits reached",
        };
        f.write_str(s)
    }
}

/// What a completed run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub depth: DownloadDepth,
    /// Pages processed, not counting pages fetched only to finish an open batch
    pub pages_processed: usize,
    pub items_processed: usize,
    pub leaves_downloaded: usize,
    /// Cursor after the run, `None` at depths that keep no cursor
    pub cursor: Option<Timestamp>,
    pub stop_reason: StopReason,
}

impl CrawlSummary {
    fn new(depth: DownloadDepth, cursor: Option<Timestamp>, stop_reason: StopReason) -> Self {
        Self {
            depth,
            pages_processed: 0,
            items_processed: 0,
            leaves_downloaded: 0,
            cursor,
            stop_reason,
        }
    }
}

/// Drives one mirror run over a catalog
///
/// All collaborators are explicit constructor parameters; `from_config`
/// wires up the HTTP client and file stores for the configured data
/// directory.
pub struct CrawlEngine<V: PageVisitor = NullVisitor> {
    config: Arc<Config>,
    client: Arc<dyn CatalogClient>,
    cursors: Arc<dyn CursorStore>,
    documents: Arc<dyn DocumentStore>,
    formatter: PathFormatter,
    visitor: V,
    cancel: CancellationToken,
}

impl CrawlEngine<NullVisitor> {
    /// Creates an engine with the default collaborators and no visitor
    pub fn from_config(config: Config, cancel: CancellationToken) -> Result<Self> {
        Self::from_config_with_visitor(config, NullVisitor, cancel)
    }
}

impl<V: PageVisitor> CrawlEngine<V> {
    /// Creates a new engine
    ///
    /// # Arguments
    ///
    /// * `config` - Run configuration, validated here
    /// * `client` - Fetch collaborator
    /// * `cursors` - Cursor persistence
    /// * `documents` - Where fetched documents are written
    /// * `visitor` - Called once for every fetched catalog page
    /// * `cancel` - Cancels the run, aborting in-flight fetches
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlEngine)` - Engine ready to run
    /// * `Err(CatalogError::Config)` - The configuration is invalid
    pub fn new(
        config: Config,
        client: Arc<dyn CatalogClient>,
        cursors: Arc<dyn CursorStore>,
        documents: Arc<dyn DocumentStore>,
        visitor: V,
        cancel: CancellationToken,
    ) -> Result<Self> {
        validate(&config)?;

        Ok(Self {
            formatter: PathFormatter::new(config.output.format_paths),
            config: Arc::new(config),
            client,
            cursors,
            documents,
            visitor,
            cancel,
        })
    }

    /// Creates an engine with the HTTP client and file stores
    pub fn from_config_with_visitor(
        config: Config,
        visitor: V,
        cancel: CancellationToken,
    ) -> Result<Self> {
        validate(&config)?;

        let client = HttpCatalogClient::with_user_agent(config.source.user_agent.as_deref())?;
        let cursors = FileCursorStore::new(
            config.output.data_dir.clone(),
            config.output.cursor_suffix.clone(),
        );
        let documents =
            FileDocumentStore::new(config.output.data_dir.clone(), config.output.json_formatting);

        Self::new(
            config,
            Arc::new(client),
            Arc::new(cursors),
            Arc::new(documents),
            visitor,
            cancel,
        )
    }

    pub fn into_visitor(self) -> V {
        self.visitor
    }

    /// Runs the mirror once
    ///
    /// Limits are normal completions. On error the cursor holds the last
    /// safely advanced value, so the next run resumes without gaps.
    pub async fn run(&mut self) -> Result<CrawlSummary> {
        let depth = self.config.download.depth;
        let source_url = Url::parse(&self.config.source.service_index_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("service-index-url: {}", e)))?;

        tracing::info!("Starting {} run against {}", depth, source_url);

        let service_index: ServiceIndex = self
            .fetch_document(&source_url, resource_path(&source_url))
            .await?;
        if depth == DownloadDepth::ServiceIndex {
            return Ok(CrawlSummary::new(depth, None, StopReason::DepthReached));
        }

        let catalog_url = parse_url(service_index.catalog_index_url(source_url.as_str())?)?;
        let catalog_index: CatalogIndex = self
            .fetch_document(&catalog_url, resource_path(&catalog_url))
            .await?;
        if !depth.tracks_cursor() {
            return Ok(CrawlSummary::new(depth, None, StopReason::DepthReached));
        }

        let resource = resource_directory(&catalog_url);
        let cursor = self.cursors.load(&resource, depth)?;
        match cursor {
            Some(cursor) => tracing::info!("Resuming {} after {}", resource, cursor),
            None => tracing::info!("No cursor for {}, mirroring from the start", resource),
        }

        let summary = self.process_pages(&resource, &catalog_index, cursor).await?;
        tracing::info!(
            "Run finished ({}): {} pages, {} items, {} leaves downloaded",
            summary.stop_reason,
            summary.pages_processed,
            summary.items_processed,
            summary.leaves_downloaded
        );
        Ok(summary)
    }

    async fn process_pages(
        &mut self,
        resource: &str,
        index: &CatalogIndex,
        mut cursor: Option<Timestamp>,
    ) -> Result<CrawlSummary> {
        let depth = self.config.download.depth;
        let max_pages = self.config.download.max_pages;

        // Index order is commit order; it is filtered, never re-sorted.
        let pages: Vec<&PageRef> = index
            .items
            .iter()
            .filter(|page| cursor.map_or(true, |cursor| page.commit_timestamp > cursor))
            .collect();
        tracing::info!(
            "{} of {} catalog pages have new commits",
            pages.len(),
            index.items.len()
        );

        let processor = PageProcessor::new(
            depth,
            LeafFetcher::new(
                self.client.clone(),
                self.documents.clone(),
                self.formatter,
                self.config.download.parallel_downloads,
                self.cancel.clone(),
            ),
        );

        let mut summary = CrawlSummary::new(depth, cursor, StopReason::FeedExhausted);
        let mut budget = CommitBudget::new(self.config.download.max_commits);
        let mut open_batch: Option<Timestamp> = None;
        let mut limit: Option<StopReason> = None;

        for (position, page_ref) in pages.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(CatalogError::Cancelled);
            }

            let is_last = position + 1 == pages.len();
            let continuation_only = limit.is_some();
            if continuation_only {
                tracing::debug!(
                    "Fetching {} to finish commit batch {:?}",
                    page_ref.url,
                    open_batch
                );
            }

            let page_url = parse_url(&page_ref.url)?;
            let page: CatalogPage = self
                .fetch_document(&page_url, self.formatter.page_path(&page_url))
                .await?;

            let window = PageWindow {
                cursor,
                listed_commit: Some(page_ref.commit_timestamp),
                open_batch,
                continuation_only,
                is_last,
            };
            let outcome = processor
                .process(&page, window, &mut budget, &mut self.visitor)
                .await?;

            if !continuation_only {
                summary.pages_processed += 1;
            }
            summary.items_processed += outcome.items_processed;
            summary.leaves_downloaded += outcome.leaves_downloaded;

            if outcome.page_max != Some(page_ref.commit_timestamp) {
                tracing::warn!(
                    "Catalog index lists {} at {}, page content ends at {:?}",
                    page_ref.url,
                    page_ref.commit_timestamp,
                    outcome.page_max
                );
            }

            self.advance_cursor(resource, &mut cursor, outcome.safe_advance_to)?;

            if let Some(failure) = outcome.failure {
                tracing::warn!(
                    "Stopping at commit {:?} on {}; cursor stays at {:?}",
                    outcome.failed_group,
                    page_ref.url,
                    cursor
                );
                return Err(failure);
            }

            open_batch = outcome.open_batch;

            if limit.is_none() {
                if outcome.refused {
                    limit = Some(StopReason::MaxCommits);
                } else if !is_last && matches!(max_pages, Some(max) if summary.pages_processed >= max)
                {
                    limit = Some(StopReason::MaxPages);
                } else if !is_last && budget.is_exhausted() {
                    limit = Some(StopReason::MaxCommits);
                }
            }

            if limit.is_some() && open_batch.is_none() {
                break;
            }
        }

        summary.cursor = cursor;
        summary.stop_reason = limit.unwrap_or(StopReason::FeedExhausted);
        Ok(summary)
    }

    /// Fetches, decodes and stores one document
    async fn fetch_document<T: DeserializeOwned>(
        &self,
        url: &Url,
        relative_path: PathBuf,
    ) -> Result<T> {
        let document = fetch_cancellable(self.client.as_ref(), url, &self.cancel).await?;
        let decoded = decode(url.as_str(), &document.bytes)?;
        let written = self.documents.write(&relative_path, &document.bytes)?;
        tracing::debug!("Stored {} at {}", url, written.display());
        Ok(decoded)
    }

    fn advance_cursor(
        &self,
        resource: &str,
        cursor: &mut Option<Timestamp>,
        candidate: Option<Timestamp>,
    ) -> Result<()> {
        let Some(candidate) = candidate else {
            return Ok(());
        };
        if cursor.map_or(false, |current| candidate <= current) {
            return Ok(());
        }

        self.cursors
            .save(resource, self.config.download.depth, candidate)?;
        *cursor = Some(candidate);
        tracing::info!("Cursor for {} advanced to {}", resource, candidate);
        Ok(())
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| CatalogError::malformed(url, format!("invalid URL: {}", e)))
}
