//! Catalog document shapes
//!
//! Only the fields the crawler reads are modelled; documents are stored
//! on disk from the original bytes, so unknown fields are never lost.

use crate::catalog::Timestamp;
use crate::CatalogError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;

/// The `@type` of the catalog resource in a service index
pub const CATALOG_RESOURCE_TYPE: &str = "Catalog/3.0.0";

/// The entry point document listing the feed's resources
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceIndex {
    #[serde(default)]
    pub resources: Vec<ServiceResource>,
}

/// One resource advertised by the service index
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceResource {
    #[serde(rename = "@id")]
    pub url: String,

    #[serde(rename = "@type")]
    pub resource_type: String,
}

impl ServiceIndex {
    /// Returns the URL of the single catalog index this service index points to
    ///
    /// The same catalog may be listed more than once; distinct catalog URLs
    /// are ambiguous and rejected.
    pub fn catalog_index_url(&self, source_url: &str) -> Result<&str, CatalogError> {
        let mut seen = HashSet::new();
        let catalogs: Vec<&str> = self
            .resources
            .iter()
            .filter(|r| r.resource_type == CATALOG_RESOURCE_TYPE)
            .map(|r| r.url.as_str())
            .filter(|url| seen.insert(*url))
            .collect();

        match catalogs.as_slice() {
            [url] => Ok(url),
            [] => Err(CatalogError::malformed(
                source_url,
                format!("no {} resource found", CATALOG_RESOURCE_TYPE),
            )),
            many => Err(CatalogError::malformed(
                source_url,
                format!(
                    "expected one {} resource, found {}",
                    CATALOG_RESOURCE_TYPE,
                    many.len()
                ),
            )),
        }
    }
}

/// The commit-ordered list of catalog pages
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogIndex {
    #[serde(default)]
    pub items: Vec<PageRef>,
}

/// A reference to one catalog page from the catalog index
#[derive(Debug, Clone, Deserialize)]
pub struct PageRef {
    #[serde(rename = "@id")]
    pub url: String,

    #[serde(default)]
    pub count: u64,

    /// Latest commit timestamp of any leaf on the page
    #[serde(rename = "commitTimeStamp")]
    pub commit_timestamp: Timestamp,
}

/// One page of leaf references
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub items: Vec<LeafRef>,
}

impl CatalogPage {
    /// Returns the latest commit timestamp actually present on the page
    pub fn max_commit_timestamp(&self) -> Option<Timestamp> {
        self.items.iter().map(|item| item.commit_timestamp).max()
    }
}

/// A reference to one leaf document from a catalog page
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LeafRef {
    #[serde(rename = "@id")]
    pub url: String,

    #[serde(rename = "@type", default)]
    pub leaf_type: String,

    #[serde(rename = "nuget:id")]
    pub id: String,

    #[serde(rename = "nuget:version")]
    pub version: String,

    #[serde(rename = "commitId", default)]
    pub commit_id: String,

    #[serde(rename = "commitTimeStamp")]
    pub commit_timestamp: Timestamp,
}

/// Decodes a catalog document, reporting failures against its URL
pub fn decode<T: DeserializeOwned>(url: &str, bytes: &[u8]) -> Result<T, CatalogError> {
    serde_json::from_slice(bytes).map_err(|e| CatalogError::malformed(url, e.to_string()))
}
