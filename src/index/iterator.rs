use std::sync::Arc;

use crate::buffer::{BufferPoolManager, PageGuard};
use crate::common::{PageId, RecordId, Result, INVALID_PAGE_ID};

use super::leaf_page::LeafNodeRef;

/// Forward iterator over the leaf chain.
///
/// Holds exactly one leaf pinned and read-latched. Stepping off the end
/// of a leaf acquires the next leaf's read latch before the current
/// one is released, so a concurrent writer can never slip a structural
/// change in between.
pub struct IndexIterator {
    bpm: Arc<BufferPoolManager>,
    /// The current leaf; None for the iterator of an empty tree
    leaf: Option<PageGuard>,
    index: usize,
}

impl IndexIterator {
    pub(crate) fn new(
        bpm: Arc<BufferPoolManager>,
        leaf: Option<PageGuard>,
        index: usize,
    ) -> Result<Self> {
        let mut iter = Self { bpm, leaf, index };
        // A keyed begin() may land one past a leaf's last slot; settle on
        // the next leaf's first entry.
        iter.hop_if_exhausted()?;
        Ok(iter)
    }

    /// One past the last entry of the last leaf (or an empty tree).
    pub fn is_end(&self) -> bool {
        match &self.leaf {
            None => true,
            Some(guard) => {
                let leaf = LeafNodeRef::new(guard.data());
                leaf.next_page_id() == INVALID_PAGE_ID && self.index == leaf.size()
            }
        }
    }

    /// The entry under the cursor. Panics at the end position.
    pub fn item(&self) -> (u32, RecordId) {
        let guard = self.leaf.as_ref().expect("dereferenced an end iterator");
        LeafNodeRef::new(guard.data()).get_item(self.index)
    }

    /// Steps to the next entry, crossing to the next leaf when this one
    /// is exhausted.
    pub fn advance(&mut self) -> Result<()> {
        if self.is_end() {
            return Ok(());
        }
        self.index += 1;
        self.hop_if_exhausted()
    }

    fn hop_if_exhausted(&mut self) -> Result<()> {
        let Some(guard) = &self.leaf else {
            return Ok(());
        };

        let next_page_id = {
            let leaf = LeafNodeRef::new(guard.data());
            if self.index < leaf.size() || leaf.next_page_id() == INVALID_PAGE_ID {
                return Ok(());
            }
            leaf.next_page_id()
        };

        let next_page = self.bpm.fetch_page(next_page_id)?;
        let next_guard = PageGuard::read(Arc::clone(&self.bpm), next_page);
        // The replacement drops the old guard only after the next leaf's
        // latch is held.
        self.leaf = Some(next_guard);
        self.index = 0;
        Ok(())
    }

    fn position(&self) -> (Option<PageId>, usize) {
        (self.leaf.as_ref().map(|g| g.page_id()), self.index)
    }
}

impl PartialEq for IndexIterator {
    fn eq(&self, other: &Self) -> bool {
        self.position() == other.position()
    }
}

impl Iterator for IndexIterator {
    type Item = Result<(u32, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_end() {
            return None;
        }
        let item = self.item();
        match self.advance() {
            Ok(()) => Some(Ok(item)),
            Err(e) => Some(Err(e)),
        }
    }
}
