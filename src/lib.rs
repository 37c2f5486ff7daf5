//! catalog-mirror: an incremental mirror of the NuGet V3 catalog
//!
//! This crate walks the catalog's service index, catalog index, pages and
//! leaf documents, storing them on disk and persisting a commit-timestamp
//! cursor so the next run resumes exactly where this one stopped.

pub mod catalog;
pub mod config;
pub mod crawler;
pub mod reports;
pub mod storage;

use thiserror::Error;

/// Main error type for catalog-mirror operations
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Malformed document {url}: {message}")]
    MalformedDocument { url: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Run cancelled")]
    Cancelled,
}

impl CatalogError {
    /// Builds a `MalformedDocument` error for the given document URL
    pub fn malformed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors reported by the fetch collaborator
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    /// Returns the URL of the failing request
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. } | Self::Timeout { url } | Self::Network { url, .. } => url,
        }
    }

    /// Returns true if retrying the same request later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Timeout { .. } | Self::Network { .. } => true,
        }
    }
}

/// Result type alias for catalog-mirror operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use catalog::{DownloadDepth, Timestamp};
pub use config::{Config, JsonFormatting};
pub use crawler::{CrawlEngine, CrawlSummary, StopReason};
