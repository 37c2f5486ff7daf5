/// Download depth definitions for bounding how far a run descends
///
/// This module defines the levels of the catalog hierarchy a run can fetch.
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// How far into the catalog hierarchy a run fetches
///
/// Variants are declared in structural order, so the derived `Ord` is the
/// depth order: fetching at depth N also fetches everything at depth < N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DownloadDepth {
    /// Only the service index
    ServiceIndex,

    /// The service index and the catalog index
    CatalogIndex,

    /// Everything above plus every catalog page newer than the cursor
    CatalogPage,

    /// Everything above plus every leaf document newer than the cursor
    CatalogLeaf,
}

impl DownloadDepth {
    /// Returns the canonical name of this depth
    ///
    /// The name is also used in cursor file names, so it must stay stable.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceIndex => "ServiceIndex",
            Self::CatalogIndex => "CatalogIndex",
            Self::CatalogPage => "CatalogPage",
            Self::CatalogLeaf => "CatalogLeaf",
        }
    }

    /// Returns true if runs at this depth track a cursor
    ///
    /// Index-only runs fetch nothing incremental and never read or write one.
    pub fn tracks_cursor(&self) -> bool {
        *self >= Self::CatalogPage
    }
}

impl Default for DownloadDepth {
    fn default() -> Self {
        Self::CatalogLeaf
    }
}

impl fmt::Display for DownloadDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadDepth {
    type Err = String;

    /// Parses a depth name case-insensitively, ignoring `-` and `_`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match key.as_str() {
            "serviceindex" => Ok(Self::ServiceIndex),
            "catalogindex" => Ok(Self::CatalogIndex),
            "catalogpage" => Ok(Self::CatalogPage),
            "catalogleaf" => Ok(Self::CatalogLeaf),
            _ => Err(format!(
                "unknown depth '{}' (expected one of ServiceIndex, CatalogIndex, CatalogPage, CatalogLeaf)",
                s
            )),
        }
    }
}

impl Serialize for DownloadDepth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DownloadDepth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
