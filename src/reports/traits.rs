//! Page visitor and report visitor contracts
//!
//! The crawler calls a `PageVisitor` once for every catalog page it
//! fetches. A `ReportVisitor` describes a keyed aggregate over pages;
//! `ReportAggregator` adapts it into a `PageVisitor` that folds each page's
//! partial aggregate into a running, key-ordered total.

use crate::catalog::CatalogPage;
use crate::Result;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

/// Hook invoked with every fetched catalog page
pub trait PageVisitor {
    /// Called exactly once per fetched page, in page order, with the full
    /// page document
    fn visit_page(&mut self, page: &CatalogPage) -> Result<()>;
}

/// Visitor that ignores every page
#[derive(Debug, Clone, Copy, Default)]
pub struct NullVisitor;

impl PageVisitor for NullVisitor {
    fn visit_page(&mut self, _page: &CatalogPage) -> Result<()> {
        Ok(())
    }
}

/// A report computed from catalog pages
///
/// # Example
///
/// ```
/// use catalog_mirror::catalog::CatalogPage;
/// use catalog_mirror::reports::ReportVisitor;
/// use std::cmp::Ordering;
/// use std::collections::HashMap;
///
/// struct PageItems;
///
/// impl ReportVisitor for PageItems {
///     type Key = &'static str;
///     type Value = usize;
///
///     fn name(&self) -> &str {
///         "PageItems"
///     }
///
///     fn compare_keys(&self, a: &Self::Key, b: &Self::Key) -> Ordering {
///         a.cmp(b)
///     }
///
///     fn on_catalog_page(
///         &mut self,
///         page: &CatalogPage,
///     ) -> catalog_mirror::Result<HashMap<Self::Key, Self::Value>> {
///         Ok(HashMap::from([("items", page.items.len())]))
///     }
///
///     fn merge(&self, existing: usize, incoming: usize) -> usize {
///         existing + incoming
///     }
/// }
/// ```
pub trait ReportVisitor {
    type Key: Eq + Hash + Clone;
    type Value: Default;

    /// Stable name of the report
    fn name(&self) -> &str;

    /// Total order over keys, used to keep the aggregate sorted
    fn compare_keys(&self, a: &Self::Key, b: &Self::Key) -> Ordering;

    /// Computes the page-local partial aggregate
    fn on_catalog_page(&mut self, page: &CatalogPage) -> Result<HashMap<Self::Key, Self::Value>>;

    /// Combines the running value of a key with a page's value
    fn merge(&self, existing: Self::Value, incoming: Self::Value) -> Self::Value;
}

/// Folds a `ReportVisitor`'s per-page output into a running total
pub struct ReportAggregator<R: ReportVisitor> {
    report: R,
    rows: Vec<(R::Key, R::Value)>,
    pages_visited: usize,
}

impl<R: ReportVisitor> ReportAggregator<R> {
    pub fn new(report: R) -> Self {
        Self {
            report,
            rows: Vec::new(),
            pages_visited: 0,
        }
    }

    /// Name of the wrapped report
    pub fn name(&self) -> &str {
        self.report.name()
    }

    /// Aggregated rows, ordered by the report's key comparer
    pub fn rows(&self) -> &[(R::Key, R::Value)] {
        &self.rows
    }

    pub fn pages_visited(&self) -> usize {
        self.pages_visited
    }

    fn fold(&mut self, key: R::Key, value: R::Value) {
        let report = &self.report;
        match self
            .rows
            .binary_search_by(|(existing, _)| report.compare_keys(existing, &key))
        {
            Ok(index) => {
                let existing = std::mem::take(&mut self.rows[index].1);
                self.rows[index].1 = self.report.merge(existing, value);
            }
            Err(index) => self.rows.insert(index, (key, value)),
        }
    }
}

impl<R: ReportVisitor> PageVisitor for ReportAggregator<R> {
    fn visit_page(&mut self, page: &CatalogPage) -> Result<()> {
        let partial = self.report.on_catalog_page(page)?;
        for (key, value) in partial {
            self.fold(key, value);
        }
        self.pages_visited += 1;
        Ok(())
    }
}
