//! Reports computed from visited catalog pages
//!
//! This module provides:
//! - The `PageVisitor` hook the crawler calls for every fetched page
//! - The `ReportVisitor` contract and its `ReportAggregator` adapter
//! - The catalog leaf count report
//! - A plain-text table printer for aggregated reports

mod leaf_count;
mod table;
mod traits;

pub use leaf_count::LeafCountVisitor;
pub use table::{format_report, print_report};
pub use traits::{NullVisitor, PageVisitor, ReportAggregator, ReportVisitor};
