//! HTTP fetch collaborator
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent
//! - GET requests for catalog documents
//! - Error classification (status, timeout, network)
//! - Cancellation of in-flight requests
//!
//! Nothing here retries; retry policy belongs to whoever runs the crawl.

use crate::{CatalogError, ConfigError, FetchError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A downloaded document
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// The requested URL
    pub url: String,
    /// Content-Type header value, if any
    pub content_type: Option<String>,
    /// Response body
    pub bytes: Vec<u8>,
}

/// Fetches catalog documents by URL
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Issues one GET request
    async fn get(&self, url: &Url) -> Result<FetchedDocument, FetchError>;
}

/// Returns the default `catalog-mirror/{version}` user agent
pub fn default_user_agent() -> String {
    format!("catalog-mirror/{}", env!("CARGO_PKG_VERSION"))
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - User-Agent override; `default_user_agent()` when `None`
///
/// # Example
///
/// ```no_run
/// use catalog_mirror::crawler::build_http_client;
///
/// let client = build_http_client(Some("MirrorBot/1.0")).unwrap();
/// ```
pub fn build_http_client(user_agent: Option<&str>) -> Result<Client, reqwest::Error> {
    let user_agent = user_agent
        .map(str::to_string)
        .unwrap_or_else(default_user_agent);

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(100))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `CatalogClient` backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    client: Client,
}

impl HttpCatalogClient {
    /// Wraps an existing reqwest client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client with the given user agent
    pub fn with_user_agent(user_agent: Option<&str>) -> Result<Self, CatalogError> {
        let client = build_http_client(user_agent).map_err(|e| {
            ConfigError::Validation(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn get(&self, url: &Url) -> Result<FetchedDocument, FetchError> {
        let url_str = url.as_str();
        tracing::debug!("GET {}", url_str);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(url_str, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url_str.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_error(url_str, e))?;

        Ok(FetchedDocument {
            url: url_str.to_string(),
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

/// Fetches a document, giving up as soon as `cancel` fires
pub async fn fetch_cancellable(
    client: &dyn CatalogClient,
    url: &Url,
    cancel: &CancellationToken,
) -> Result<FetchedDocument, CatalogError> {
    if cancel.is_cancelled() {
        return Err(CatalogError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CatalogError::Cancelled),
        result = client.get(url) => result.map_err(CatalogError::from),
    }
}
