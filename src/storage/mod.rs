//! Storage module for persisting mirrored data
//!
//! This module handles everything the crawler writes locally:
//! - Cursor persistence, one timestamp per catalog and depth
//! - Downloaded documents, optionally re-indented
//! - The path layout that maps catalog URLs to files

mod files;
mod paths;
mod traits;

pub use files::{atomic_write, format_json, FileCursorStore, FileDocumentStore};
pub use paths::{
    parse_page_index, resource_directory, resource_path, PathFormatter, PAGE_BUCKET_SIZE,
};
pub use traits::{CursorStore, DocumentStore, StorageError, StorageResult};
