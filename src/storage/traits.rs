//! Storage traits and error types
//!
//! This module defines the trait interface for the two storage
//! collaborators the crawler writes through: cursors and documents.

use crate::catalog::{DownloadDepth, Timestamp};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Corrupt cursor at {}: {message}", path.display())]
    CorruptCursor { path: PathBuf, message: String },

    #[error("Serialization error for {}: {message}", path.display())]
    Serialization { path: PathBuf, message: String },
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persists one resumption timestamp per (resource, depth) pair
///
/// A saved value must survive a crash in the middle of `save`: readers see
/// either the previous value or the new one, never a partial write.
pub trait CursorStore: Send + Sync {
    /// Loads the cursor, or `None` if no run has saved one yet
    fn load(&self, resource: &str, depth: DownloadDepth) -> StorageResult<Option<Timestamp>>;

    /// Replaces the cursor
    fn save(&self, resource: &str, depth: DownloadDepth, value: Timestamp) -> StorageResult<()>;
}

/// Writes downloaded documents
pub trait DocumentStore: Send + Sync {
    /// Stores a document at a path relative to the store's root
    ///
    /// Returns the full path of the written file.
    fn write(&self, relative_path: &Path, bytes: &[u8]) -> StorageResult<PathBuf>;
}
