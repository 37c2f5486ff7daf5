//! Bounded pool that downloads and stores leaf documents
//!
//! At most `parallel_downloads` fetches are in flight at once. Results come
//! back in completion order, one per submitted leaf; nothing is retried.

use crate::catalog::LeafRef;
use crate::crawler::client::{fetch_cancellable, CatalogClient};
use crate::storage::{DocumentStore, PathFormatter};
use crate::CatalogError;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Outcome of downloading one leaf
#[derive(Debug)]
pub struct LeafResult {
    pub leaf: LeafRef,
    /// Path of the stored document, or why it could not be stored
    pub outcome: Result<PathBuf, CatalogError>,
}

/// Downloads leaf documents with a concurrency limit
pub struct LeafFetcher {
    client: Arc<dyn CatalogClient>,
    documents: Arc<dyn DocumentStore>,
    formatter: PathFormatter,
    parallelism: usize,
    cancel: CancellationToken,
}

impl LeafFetcher {
    /// Creates a leaf fetcher
    ///
    /// # Arguments
    ///
    /// * `client` - Fetch collaborator
    /// * `documents` - Where leaf documents are written
    /// * `formatter` - Maps leaf URLs to storage paths
    /// * `parallelism` - Maximum concurrent fetches; values below 1 act as 1
    /// * `cancel` - Aborts in-flight fetches when cancelled
    pub fn new(
        client: Arc<dyn CatalogClient>,
        documents: Arc<dyn DocumentStore>,
        formatter: PathFormatter,
        parallelism: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            documents,
            formatter,
            parallelism: parallelism.max(1),
            cancel,
        }
    }

    /// Downloads and stores every leaf, returning one result per leaf
    pub async fn fetch_all(&self, leaves: &[LeafRef]) -> Vec<LeafResult> {
        stream::iter(leaves.iter().cloned())
            .map(|leaf| async move {
                let outcome = self.fetch_one(&leaf).await;
                LeafResult { leaf, outcome }
            })
            .buffer_unordered(self.parallelism)
            .collect()
            .await
    }

    async fn fetch_one(&self, leaf: &LeafRef) -> Result<PathBuf, CatalogError> {
        let url = Url::parse(&leaf.url)
            .map_err(|e| CatalogError::malformed(&leaf.url, format!("invalid leaf URL: {}", e)))?;

        let document = fetch_cancellable(self.client.as_ref(), &url, &self.cancel).await?;
        let path = self.formatter.leaf_path(&url, leaf);
        let written = self.documents.write(&path, &document.bytes)?;

        tracing::debug!("Stored leaf {} {} at {}", leaf.id, leaf.version, written.display());
        Ok(written)
    }
}
