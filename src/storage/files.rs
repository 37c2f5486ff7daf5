//! File-system backed cursor and document stores
//!
//! Every write goes to a temporary file in the destination directory and is
//! renamed into place, so a crash never leaves a half-written cursor or
//! document behind.

use crate::catalog::{DownloadDepth, Timestamp};
use crate::config::JsonFormatting;
use crate::storage::traits::{CursorStore, DocumentStore, StorageError, StorageResult};
use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Atomically replaces `path` with `bytes`, creating parent directories
pub fn atomic_write(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| StorageError::io(parent, e))?;
    tmp.write_all(bytes).map_err(|e| StorageError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StorageError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| StorageError::io(path, e.error))?;

    Ok(())
}

/// Cursor files under a data directory
///
/// The cursor for `(resource, depth)` lives at
/// `{root}/{resource}/cursor.{suffix}.{depth}.json` and holds the timestamp
/// as a JSON string.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    root: PathBuf,
    suffix: String,
}

impl FileCursorStore {
    /// Creates a cursor store rooted at `root`
    pub fn new(root: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            suffix: suffix.into(),
        }
    }

    /// Returns the file backing the cursor for `(resource, depth)`
    pub fn cursor_path(&self, resource: &str, depth: DownloadDepth) -> PathBuf {
        let mut path = self.root.clone();
        for part in resource.split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path.push(format!("cursor.{}.{}.json", self.suffix, depth));
        path
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self, resource: &str, depth: DownloadDepth) -> StorageResult<Option<Timestamp>> {
        let path = self.cursor_path(resource, depth);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        let value: Timestamp =
            serde_json::from_str(content.trim()).map_err(|e| StorageError::CorruptCursor {
                path: path.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!("Loaded cursor {} from {}", value, path.display());
        Ok(Some(value))
    }

    fn save(&self, resource: &str, depth: DownloadDepth, value: Timestamp) -> StorageResult<()> {
        let path = self.cursor_path(resource, depth);
        let content = serde_json::to_string(&value).map_err(|e| StorageError::Serialization {
            path: path.clone(),
            message: e.to_string(),
        })?;

        atomic_write(&path, content.as_bytes())?;
        tracing::debug!("Saved cursor {} to {}", value, path.display());
        Ok(())
    }
}

/// Downloaded documents under a data directory
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    root: PathBuf,
    formatting: JsonFormatting,
}

impl FileDocumentStore {
    /// Creates a document store rooted at `root`
    pub fn new(root: impl Into<PathBuf>, formatting: JsonFormatting) -> Self {
        Self {
            root: root.into(),
            formatting,
        }
    }
}

impl DocumentStore for FileDocumentStore {
    fn write(&self, relative_path: &Path, bytes: &[u8]) -> StorageResult<PathBuf> {
        let path = self.root.join(relative_path);
        let content = format_json(bytes, self.formatting).map_err(|e| {
            StorageError::Serialization {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;

        atomic_write(&path, &content)?;
        Ok(path)
    }
}

/// Applies the configured JSON formatting to a downloaded document
///
/// `Pretty` keeps the document's key order and string values untouched.
pub fn format_json(bytes: &[u8], formatting: JsonFormatting) -> serde_json::Result<Cow<'_, [u8]>> {
    match formatting {
        JsonFormatting::Unchanged => Ok(Cow::Borrowed(bytes)),
        JsonFormatting::Pretty => {
            let value: serde_json::Value = serde_json::from_slice(bytes)?;
            Ok(Cow::Owned(serde_json::to_vec_pretty(&value)?))
        }
    }
}
