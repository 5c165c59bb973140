use std::collections::HashSet;

use crate::buffer::PageGuard;
use crate::common::PageId;

/// Per-operation carrier for the latch-crabbing protocol.
///
/// Holds the write-latched pages of the current descent in root-to-leaf
/// order, and the set of pages a remove has scheduled for deletion.
/// Guards release latch-then-pin on drop, so `release_all` (and any
/// early-exit drop of the transaction) unwinds ancestors first.
pub struct Transaction {
    page_set: Vec<PageGuard>,
    deleted_page_set: HashSet<PageId>,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            page_set: Vec::new(),
            deleted_page_set: HashSet::new(),
        }
    }

    pub fn add_page(&mut self, guard: PageGuard) {
        self.page_set.push(guard);
    }

    /// Releases every held page, ancestors first.
    pub fn release_all(&mut self) {
        self.page_set.drain(..);
    }

    pub fn len(&self) -> usize {
        self.page_set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.page_set.is_empty()
    }

    pub fn page(&self, index: usize) -> &PageGuard {
        &self.page_set[index]
    }

    pub fn page_mut(&mut self, index: usize) -> &mut PageGuard {
        &mut self.page_set[index]
    }

    /// Simultaneous mutable access to a held page and its held parent.
    pub fn parent_and_child_mut(&mut self, child: usize) -> (&mut PageGuard, &mut PageGuard) {
        assert!(child > 0, "child has no held parent");
        let (left, right) = self.page_set.split_at_mut(child);
        (&mut left[child - 1], &mut right[0])
    }

    /// Index of a held page by page id, if present.
    pub fn position(&self, page_id: PageId) -> Option<usize> {
        self.page_set.iter().position(|g| g.page_id() == page_id)
    }

    pub fn add_deleted_page(&mut self, page_id: PageId) {
        self.deleted_page_set.insert(page_id);
    }

    /// Drains the deletion set for the caller to hand to the pool.
    pub fn take_deleted_pages(&mut self) -> Vec<PageId> {
        self.deleted_page_set.drain().collect()
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}
