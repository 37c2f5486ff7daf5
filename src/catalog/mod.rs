//! Catalog data model
//!
//! # Components
//!
//! - `DownloadDepth`: how far into the catalog hierarchy a run descends
//! - `Timestamp`: the commit timestamp that orders every document
//! - Document shapes for the service index, catalog index and catalog pages

mod depth;
mod documents;
mod timestamp;

pub use depth::DownloadDepth;
pub use documents::{
    decode, CatalogIndex, CatalogPage, LeafRef, PageRef, ServiceIndex, ServiceResource,
    CATALOG_RESOURCE_TYPE,
};
pub use timestamp::Timestamp;
