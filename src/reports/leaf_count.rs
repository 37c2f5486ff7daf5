//! Catalog leaf count report
//!
//! Counts leaf items per UTC hour of their commit timestamp.

use crate::catalog::{CatalogPage, Timestamp};
use crate::reports::traits::ReportVisitor;
use crate::Result;
use chrono::{DateTime, SubsecRound, Timelike, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct LeafCountVisitor;

impl LeafCountVisitor {
    pub fn new() -> Self {
        Self
    }
}

impl ReportVisitor for LeafCountVisitor {
    type Key = DateTime<Utc>;
    type Value = u64;

    fn name(&self) -> &str {
        "CatalogLeafCount"
    }

    fn compare_keys(&self, a: &DateTime<Utc>, b: &DateTime<Utc>) -> Ordering {
        a.cmp(b)
    }

    fn on_catalog_page(&mut self, page: &CatalogPage) -> Result<HashMap<DateTime<Utc>, u64>> {
        let mut counts = HashMap::new();
        for item in &page.items {
            if let Some(hour) = hour_of(&item.commit_timestamp) {
                *counts.entry(hour).or_default() += 1;
            }
        }
        Ok(counts)
    }

    fn merge(&self, existing: u64, incoming: u64) -> u64 {
        existing + incoming
    }
}

/// Start of the UTC hour containing `timestamp`
fn hour_of(timestamp: &Timestamp) -> Option<DateTime<Utc>> {
    timestamp
        .to_utc()
        .trunc_subsecs(0)
        .with_minute(0)?
        .with_second(0)
}
