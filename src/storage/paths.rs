//! Local path layout for mirrored documents
//!
//! Documents are stored under `{host}/{url path}`. Pages and leaves can
//! additionally be bucketed ("formatted") so no single directory collects
//! millions of files. Bucketing only changes where a document is stored,
//! never which URL is requested.

use crate::catalog::{LeafRef, Timestamp};
use std::path::PathBuf;
use url::Url;

/// Number of consecutive pages sharing one bucket directory
pub const PAGE_BUCKET_SIZE: u64 = 500;

/// Maps catalog pages and leaves to storage paths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathFormatter {
    formatted: bool,
}

impl PathFormatter {
    /// Creates a formatter; `format_paths` enables bucketed layouts
    pub fn new(format_paths: bool) -> Self {
        Self {
            formatted: format_paths,
        }
    }

    /// Path of page N relative to the catalog directory
    ///
    /// Flat: `page{N}.json`. Formatted: `page{start}-page{end}/page{N}.json`
    /// with buckets of `PAGE_BUCKET_SIZE` pages.
    pub fn format_page_path(&self, page_index: u64) -> PathBuf {
        let file_name = format!("page{}.json", page_index);
        if !self.formatted {
            return PathBuf::from(file_name);
        }

        let start = page_index / PAGE_BUCKET_SIZE * PAGE_BUCKET_SIZE;
        let end = start + PAGE_BUCKET_SIZE - 1;
        let mut path = PathBuf::from(format!("page{}-page{}", start, end));
        path.push(file_name);
        path
    }

    /// Path of a leaf relative to the catalog directory
    ///
    /// Flat: `yyyy.MM.dd.HH.mm.ss/{id}.{version}.json`. Formatted:
    /// `yyyy/MM/dd/HH/mm.ss/{id}.{version}.json`. The timestamp is taken in
    /// UTC; id and version are lower-cased like the feed's own URLs.
    pub fn format_leaf_path(&self, commit_timestamp: &Timestamp, id: &str, version: &str) -> PathBuf {
        let utc = commit_timestamp.to_utc();
        let file_name = format!(
            "{}.{}.json",
            id.to_lowercase(),
            version.to_lowercase()
        );

        let mut path = PathBuf::new();
        if self.formatted {
            path.push(utc.format("%Y").to_string());
            path.push(utc.format("%m").to_string());
            path.push(utc.format("%d").to_string());
            path.push(utc.format("%H").to_string());
            path.push(utc.format("%M.%S").to_string());
        } else {
            path.push(utc.format("%Y.%m.%d.%H.%M.%S").to_string());
        }
        path.push(file_name);
        path
    }

    /// Storage path of a catalog page, relative to the data directory
    ///
    /// Page URLs not ending in `page{N}.json` are stored verbatim.
    pub fn page_path(&self, url: &Url) -> PathBuf {
        let (mut directory, file_name) = split_url(url);
        match file_name.as_deref().and_then(parse_page_index) {
            Some(index) => {
                directory.push(self.format_page_path(index));
                directory
            }
            None => resource_path(url),
        }
    }

    /// Storage path of a leaf document, relative to the data directory
    ///
    /// The leaf URL's last two segments (timestamp directory and file name)
    /// are replaced by `format_leaf_path`.
    pub fn leaf_path(&self, url: &Url, leaf: &LeafRef) -> PathBuf {
        let segments = path_segments(url);
        let keep = segments.len().saturating_sub(2);

        let mut path = PathBuf::from(host_of(url));
        for segment in &segments[..keep] {
            path.push(segment);
        }
        path.push(self.format_leaf_path(&leaf.commit_timestamp, &leaf.id, &leaf.version));
        path
    }
}

/// Storage path of a document stored verbatim, relative to the data directory
pub fn resource_path(url: &Url) -> PathBuf {
    let mut path = PathBuf::from(host_of(url));
    for segment in path_segments(url) {
        path.push(segment);
    }
    path
}

/// Directory of a resource, `/`-separated, used to key cursors
///
/// `https://api.nuget.org/v3/catalog0/index.json` → `api.nuget.org/v3/catalog0`
pub fn resource_directory(url: &Url) -> String {
    let segments = path_segments(url);
    let keep = segments.len().saturating_sub(1);

    let mut parts = vec![host_of(url)];
    parts.extend(segments[..keep].iter().cloned());
    parts.join("/")
}

/// Parses the page number out of a `page{N}.json` file name
pub fn parse_page_index(file_name: &str) -> Option<u64> {
    let digits = file_name.strip_prefix("page")?.strip_suffix(".json")?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn host_of(url: &Url) -> String {
    url.host_str().unwrap_or("localhost").to_string()
}

/// Non-empty, non-traversing path segments of a URL
fn path_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty() && *s != "." && *s != "..")
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Splits a URL into `{host}/{directories}` and its final segment
fn split_url(url: &Url) -> (PathBuf, Option<String>) {
    let mut segments = path_segments(url);
    let file_name = segments.pop();

    let mut directory = PathBuf::from(host_of(url));
    for segment in segments {
        directory.push(segment);
    }
    (directory, file_name)
}
