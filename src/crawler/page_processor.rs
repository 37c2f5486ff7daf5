//! Commit-group walk over one catalog page
//!
//! A page's items are filtered to the window between the cursor and the
//! commit timestamp the catalog index lists for the page, grouped by exact
//! commit timestamp and processed group by group in ascending order. A group
//! is either processed entirely or not at all; the cursor may only ever move
//! to the timestamp of a fully processed group that is known to be closed.

use crate::catalog::{CatalogPage, DownloadDepth, LeafRef, Timestamp};
use crate::crawler::leaf_fetcher::LeafFetcher;
use crate::reports::PageVisitor;
use crate::{CatalogError, Result};
use std::collections::BTreeMap;

/// Remaining `max-commits` allowance for a run, counted in leaf items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitBudget {
    limit: Option<usize>,
    spent: usize,
}

impl CommitBudget {
    /// Creates a budget; `None` means unlimited
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit, spent: 0 }
    }

    /// Returns true if a group of `group_len` items may start
    ///
    /// The first group of a run is always admitted, even when it alone is
    /// larger than the limit; otherwise an oversized batch would block the
    /// mirror forever.
    pub fn admits(&self, group_len: usize) -> bool {
        match self.limit {
            None => true,
            Some(_) if self.spent == 0 => true,
            Some(limit) => self.spent + group_len <= limit,
        }
    }

    /// Records processed items
    pub fn spend(&mut self, items: usize) {
        self.spent += items;
    }

    /// Returns true once the limit has been reached
    pub fn is_exhausted(&self) -> bool {
        matches!(self.limit, Some(limit) if self.spent >= limit)
    }
}

/// What a page may process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageWindow {
    /// Items at or before the cursor are already mirrored
    pub cursor: Option<Timestamp>,
    /// Commit timestamp the catalog index lists for the page
    ///
    /// Items after it are not published yet and are left for a later run.
    /// Groups before it are closed. `None` means the page is unbounded and
    /// nothing is closed before the last page.
    pub listed_commit: Option<Timestamp>,
    /// Commit batch started on an earlier page and not yet known to be closed
    pub open_batch: Option<Timestamp>,
    /// Only the open batch may be processed
    pub continuation_only: bool,
    /// The page is the last one the index lists past the cursor
    pub is_last: bool,
}

impl PageWindow {
    fn admits(&self, commit: Timestamp) -> bool {
        self.cursor.map_or(true, |cursor| commit > cursor)
            && self.listed_commit.map_or(true, |listed| commit <= listed)
    }

    fn closes(&self, commit: Timestamp) -> bool {
        self.is_last || matches!(self.listed_commit, Some(listed) if commit < listed)
    }
}

/// Result of walking one page
#[derive(Debug, Default)]
pub struct PageOutcome {
    /// Timestamps of fully processed groups, ascending
    pub completed: Vec<Timestamp>,
    /// Latest finished batch known to be closed; the cursor may move here
    pub safe_advance_to: Option<Timestamp>,
    /// Finished batch that may continue on the next page
    pub open_batch: Option<Timestamp>,
    pub items_processed: usize,
    pub leaves_downloaded: usize,
    /// Latest commit timestamp of any item on the page, eligible or not
    pub page_max: Option<Timestamp>,
    /// A group was left for a later run because of the commit budget
    pub refused: bool,
    pub failure: Option<CatalogError>,
    /// Group whose leaves failed
    pub failed_group: Option<Timestamp>,
}

/// Walks the commit groups of catalog pages
pub struct PageProcessor {
    depth: DownloadDepth,
    leaves: LeafFetcher,
}

impl PageProcessor {
    pub fn new(depth: DownloadDepth, leaves: LeafFetcher) -> Self {
        Self { depth, leaves }
    }

    /// Processes the groups of `page` that the window and budget admit
    ///
    /// At `CatalogLeaf` depth every item of an admitted group is downloaded
    /// and the group only counts as processed if all downloads succeeded.
    /// At shallower depths groups are counted without fetching leaves.
    ///
    /// `visitor` sees the full page before any leaf is dispatched; a visitor
    /// error is returned before anything is processed.
    pub async fn process<V: PageVisitor>(
        &self,
        page: &CatalogPage,
        window: PageWindow,
        budget: &mut CommitBudget,
        visitor: &mut V,
    ) -> Result<PageOutcome> {
        visitor.visit_page(page)?;

        let mut outcome = PageOutcome {
            page_max: page.max_commit_timestamp(),
            ..PageOutcome::default()
        };

        for (commit, items) in eligible_groups(page, &window) {
            let continues_batch = window.open_batch == Some(commit);
            if !continues_batch && (window.continuation_only || !budget.admits(items.len())) {
                tracing::debug!(
                    "Leaving commit {} ({} items) for a later run",
                    commit,
                    items.len()
                );
                outcome.refused = true;
                break;
            }

            if self.depth >= DownloadDepth::CatalogLeaf {
                let results = self.leaves.fetch_all(&items).await;
                let mut failure = None;
                for result in results {
                    match result.outcome {
                        Ok(_) => outcome.leaves_downloaded += 1,
                        Err(e) => {
                            tracing::warn!(
                                "Leaf {} {} failed: {}",
                                result.leaf.id,
                                result.leaf.version,
                                e
                            );
                            failure.get_or_insert(e);
                        }
                    }
                }

                if let Some(e) = failure {
                    outcome.failure = Some(e);
                    outcome.failed_group = Some(commit);
                    break;
                }
            }

            budget.spend(items.len());
            outcome.items_processed += items.len();
            outcome.completed.push(commit);
        }

        // The open batch is finished unless its own leaves failed here.
        let done: Vec<Timestamp> = window
            .open_batch
            .filter(|batch| outcome.failed_group != Some(*batch))
            .into_iter()
            .chain(outcome.completed.iter().copied())
            .collect();
        outcome.safe_advance_to = done
            .iter()
            .copied()
            .filter(|commit| window.closes(*commit))
            .max();
        // A finished batch that is neither closed nor at the listed commit is
        // dropped unsaved; the next run fetches it again.
        if !window.is_last {
            outcome.open_batch = done
                .iter()
                .copied()
                .max()
                .filter(|commit| Some(*commit) == window.listed_commit);
        }

        Ok(outcome)
    }
}

/// Items inside the window, grouped by exact commit timestamp
fn eligible_groups(page: &CatalogPage, window: &PageWindow) -> BTreeMap<Timestamp, Vec<LeafRef>> {
    let mut groups: BTreeMap<Timestamp, Vec<LeafRef>> = BTreeMap::new();
    for item in &page.items {
        if window.admits(item.commit_timestamp) {
            groups
                .entry(item.commit_timestamp)
                .or_default()
                .push(item.clone());
        }
    }
    groups
}
