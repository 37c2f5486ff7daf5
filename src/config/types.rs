use crate::catalog::DownloadDepth;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The NuGet.org V3 service index
pub const DEFAULT_SERVICE_INDEX_URL: &str = "https://api.nuget.org/v3/index.json";

/// Default number of leaf documents fetched concurrently
pub const DEFAULT_PARALLEL_DOWNLOADS: usize = 16;

/// Default prefix of cursor file names
pub const DEFAULT_CURSOR_SUFFIX: &str = "download";

/// Main configuration structure for catalog-mirror
///
/// Every section and key is optional; missing values fall back to the
/// defaults of a full NuGet.org mirror.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub download: DownloadConfig,
    pub output: OutputConfig,
}

/// Where the feed is read from
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// The service index URL the crawl starts from
    #[serde(rename = "service-index-url")]
    pub service_index_url: String,

    /// User-Agent header override
    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,
}

/// What a run fetches and when it stops
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Deepest level of the catalog hierarchy to fetch
    pub depth: DownloadDepth,

    /// Maximum number of catalog pages to complete before stopping
    #[serde(rename = "max-pages")]
    pub max_pages: Option<usize>,

    /// Maximum number of leaf items to complete before stopping
    #[serde(rename = "max-commits")]
    pub max_commits: Option<usize>,

    /// Maximum number of leaf documents fetched concurrently
    #[serde(rename = "parallel-downloads")]
    pub parallel_downloads: usize,
}

/// Where and how documents and cursors are stored
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for stored documents and cursors
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    /// How downloaded JSON is written to disk
    #[serde(rename = "json-formatting")]
    pub json_formatting: JsonFormatting,

    /// Bucket page and leaf paths to keep directories small
    #[serde(rename = "format-paths")]
    pub format_paths: bool,

    /// Name prefix of the cursor file, combined with the depth
    #[serde(rename = "cursor-suffix")]
    pub cursor_suffix: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            service_index_url: DEFAULT_SERVICE_INDEX_URL.to_string(),
            user_agent: None,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            depth: DownloadDepth::default(),
            max_pages: None,
            max_commits: None,
            parallel_downloads: DEFAULT_PARALLEL_DOWNLOADS,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            json_formatting: JsonFormatting::default(),
            format_paths: false,
            cursor_suffix: DEFAULT_CURSOR_SUFFIX.to_string(),
        }
    }
}

/// How downloaded JSON documents are written to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormatting {
    /// Store the bytes exactly as received
    #[default]
    Unchanged,

    /// Re-indent the document before storing it
    Pretty,
}

impl fmt::Display for JsonFormatting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => f.write_str("Unchanged"),
            Self::Pretty => f.write_str("Pretty"),
        }
    }
}

impl FromStr for JsonFormatting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unchanged" => Ok(Self::Unchanged),
            "pretty" => Ok(Self::Pretty),
            _ => Err(format!(
                "unknown JSON formatting '{}' (expected Unchanged or Pretty)",
                s
            )),
        }
    }
}

impl<'de> Deserialize<'de> for JsonFormatting {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
