use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::buffer::{BufferPoolManager, PageGuard};
use crate::common::{PageId, RecordId, Result, HEADER_PAGE_ID, INVALID_PAGE_ID};

use super::btree_page::{NodeMut, NodeRef};
use super::header_page::{HeaderPage, HeaderPageRef};
use super::internal_page::{internal_capacity, InternalNode, InternalNodeRef};
use super::iterator::IndexIterator;
use super::key_comparator::KeyComparator;
use super::leaf_page::{leaf_capacity, LeafNode, LeafNodeRef};
use super::transaction::Transaction;

/// What a descent is about to do, which decides latch modes and when
/// ancestors can be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Find,
    Insert,
    Delete,
}

/// The tree latch: holding the guard is holding the latch, and the guard
/// is the only way to read or change the root page id.
type TreeLatch<'a> = Option<MutexGuard<'a, PageId>>;

/// A disk-resident B+ tree index over the buffer pool.
///
/// Keys are unique. Descent uses latch crabbing: write operations keep
/// ancestor write latches until the current node provably absorbs any
/// split or merge, readers hold one latch at a time. All structural
/// changes to the root id happen under the tree latch.
pub struct BPlusTree {
    index_name: String,
    /// Root page id behind the tree latch (INVALID_PAGE_ID when empty)
    root_page_id: Mutex<PageId>,
    bpm: Arc<BufferPoolManager>,
    comparator: Arc<dyn KeyComparator>,
    leaf_max_size: u32,
    internal_max_size: u32,
}

impl BPlusTree {
    pub fn new(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: Arc<dyn KeyComparator>,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> Self {
        assert!(leaf_max_size >= 3, "leaf max size too small");
        assert!(internal_max_size >= 3, "internal max size too small");
        assert!(
            leaf_max_size as usize <= leaf_capacity(),
            "leaf max size exceeds page capacity"
        );
        // An internal node transiently holds max_size + 1 entries before
        // it splits.
        assert!(
            internal_max_size as usize + 1 <= internal_capacity(),
            "internal max size exceeds page capacity"
        );

        Self {
            index_name: index_name.into(),
            root_page_id: Mutex::new(INVALID_PAGE_ID),
            bpm,
            comparator,
            leaf_max_size,
            internal_max_size,
        }
    }

    /// Reattaches to an index previously persisted through the header
    /// page.
    pub fn open(
        index_name: impl Into<String>,
        bpm: Arc<BufferPoolManager>,
        comparator: Arc<dyn KeyComparator>,
        leaf_max_size: u32,
        internal_max_size: u32,
    ) -> Result<Self> {
        let tree = Self::new(index_name, bpm, comparator, leaf_max_size, internal_max_size);

        let root_id = {
            let page = tree.bpm.fetch_page(HEADER_PAGE_ID)?;
            let guard = PageGuard::read(Arc::clone(&tree.bpm), page);
            let header = HeaderPageRef::new(guard.data());
            header.get_root_id(&tree.index_name)
        };
        if let Some(root_id) = root_id {
            *tree.root_page_id.lock() = root_id;
        }
        Ok(tree)
    }

    pub fn name(&self) -> &str {
        &self.index_name
    }

    pub fn is_empty(&self) -> bool {
        *self.root_page_id.lock() == INVALID_PAGE_ID
    }

    pub fn root_page_id(&self) -> PageId {
        *self.root_page_id.lock()
    }

    /// Point lookup.
    pub fn get_value(&self, key: u32) -> Result<Option<RecordId>> {
        let Some(guard) = self.find_leaf(Some(key), false, false)? else {
            return Ok(None);
        };
        let leaf = LeafNodeRef::new(guard.data());
        Ok(leaf.lookup(key, self.comparator.as_ref()))
    }

    /// Inserts a unique key. Returns false (leaving the tree untouched)
    /// if the key is already present.
    pub fn insert(&self, key: u32, value: RecordId, txn: &mut Transaction) -> Result<bool> {
        let mut tree_latch: TreeLatch = Some(self.root_page_id.lock());

        if **tree_latch.as_ref().unwrap() == INVALID_PAGE_ID {
            let root_guard = tree_latch.as_mut().unwrap();
            return self.start_new_tree(key, value, root_guard);
        }

        let result = self.insert_into_leaf(key, value, txn, &mut tree_latch);
        if result.is_err() {
            txn.release_all();
        }
        result
    }

    /// Removes a key. Removing a missing key (or from an empty tree) is
    /// a silent no-op.
    pub fn remove(&self, key: u32, txn: &mut Transaction) -> Result<()> {
        let mut tree_latch: TreeLatch = Some(self.root_page_id.lock());

        if **tree_latch.as_ref().unwrap() == INVALID_PAGE_ID {
            return Ok(());
        }

        let result = self.remove_entry(key, txn, &mut tree_latch);
        txn.release_all();
        drop(tree_latch);

        // Only now, with every latch and pin released, hand the emptied
        // pages back to the pool.
        let deleted = txn.take_deleted_pages();
        result?;
        for page_id in deleted {
            self.bpm.delete_page(page_id)?;
        }
        Ok(())
    }

    /// Iterator positioned at the first key.
    pub fn begin(&self) -> Result<IndexIterator> {
        let leaf = self.find_leaf(None, true, false)?;
        IndexIterator::new(Arc::clone(&self.bpm), leaf, 0)
    }

    /// Iterator positioned at the first key at or above `key`.
    pub fn begin_at(&self, key: u32) -> Result<IndexIterator> {
        let Some(guard) = self.find_leaf(Some(key), false, false)? else {
            return IndexIterator::new(Arc::clone(&self.bpm), None, 0);
        };
        let index = LeafNodeRef::new(guard.data()).key_index(key, self.comparator.as_ref());
        IndexIterator::new(Arc::clone(&self.bpm), Some(guard), index)
    }

    /// Iterator positioned one past the last key.
    pub fn end(&self) -> Result<IndexIterator> {
        let Some(guard) = self.find_leaf(None, false, true)? else {
            return IndexIterator::new(Arc::clone(&self.bpm), None, 0);
        };
        let size = LeafNodeRef::new(guard.data()).size();
        IndexIterator::new(Arc::clone(&self.bpm), Some(guard), size)
    }

    /// Collects all pairs with start_key <= key <= end_key.
    pub fn range_scan(&self, start_key: u32, end_key: u32) -> Result<Vec<(u32, RecordId)>> {
        let mut results = Vec::new();
        let mut iter = self.begin_at(start_key)?;
        while !iter.is_end() {
            let (key, value) = iter.item();
            if self.comparator.compare(key, end_key) == std::cmp::Ordering::Greater {
                break;
            }
            results.push((key, value));
            iter.advance()?;
        }
        Ok(results)
    }

    /// Persists the current root page id into the header page record for
    /// this index. `insert` adds the record instead of updating it.
    pub fn update_root_page_id(&self, insert: bool) -> Result<()> {
        let root_id = *self.root_page_id.lock();
        self.update_root_record(root_id, insert)
    }

    // ------------------------------------------------------------------
    // Descent
    // ------------------------------------------------------------------

    /// Read-crabbing descent to a leaf: latch the child, then release the
    /// parent. Returns None on an empty tree.
    fn find_leaf(
        &self,
        key: Option<u32>,
        leftmost: bool,
        rightmost: bool,
    ) -> Result<Option<PageGuard>> {
        let tree_latch = self.root_page_id.lock();
        let root_id = *tree_latch;
        if root_id == INVALID_PAGE_ID {
            return Ok(None);
        }

        let page = self.bpm.fetch_page(root_id)?;
        let mut guard = PageGuard::read(Arc::clone(&self.bpm), page);
        drop(tree_latch);

        loop {
            let child_id = {
                let node = NodeRef::new(guard.data());
                if node.is_leaf() {
                    return Ok(Some(guard));
                }
                let internal = InternalNodeRef::new(guard.data());
                if leftmost {
                    internal.value_at(0)
                } else if rightmost {
                    internal.value_at(internal.size() - 1)
                } else {
                    internal.lookup(key.expect("keyed descent without a key"), self.comparator.as_ref())
                }
            };

            let child_page = self.bpm.fetch_page(child_id)?;
            let child_guard = PageGuard::read(Arc::clone(&self.bpm), child_page);
            // Assignment drops the parent guard after the child latch is
            // in hand.
            guard = child_guard;
        }
    }

    /// Write-crabbing descent to the leaf covering `key`. Latched pages
    /// accumulate in the transaction, root first; every time a node
    /// proves safe for `op`, all its ancestors (and the tree latch) are
    /// released.
    fn find_leaf_write(
        &self,
        key: u32,
        op: Operation,
        txn: &mut Transaction,
        tree_latch: &mut TreeLatch,
    ) -> Result<()> {
        let root_id = **tree_latch.as_ref().expect("descent without the tree latch");

        let page = self.bpm.fetch_page(root_id)?;
        let guard = PageGuard::write(Arc::clone(&self.bpm), page);
        if self.is_safe(&NodeRef::new(guard.data()), op) {
            *tree_latch = None;
        }
        txn.add_page(guard);

        loop {
            let child_id = {
                let current = txn.page(txn.len() - 1);
                let node = NodeRef::new(current.data());
                if node.is_leaf() {
                    return Ok(());
                }
                InternalNodeRef::new(current.data()).lookup(key, self.comparator.as_ref())
            };

            let child_page = self.bpm.fetch_page(child_id)?;
            let child_guard = PageGuard::write(Arc::clone(&self.bpm), child_page);
            if self.is_safe(&NodeRef::new(child_guard.data()), op) {
                txn.release_all();
                *tree_latch = None;
            }
            txn.add_page(child_guard);
        }
    }

    /// Whether `op` on this node can propagate a structural change to
    /// its parent (or, for the root, change the root id).
    fn is_safe(&self, node: &NodeRef, op: Operation) -> bool {
        match op {
            Operation::Find => true,
            // A leaf splits when an insert fills it to max_size; an
            // internal node splits one entry later.
            Operation::Insert => {
                if node.is_leaf() {
                    node.size() + 1 < node.max_size()
                } else {
                    node.size() < node.max_size()
                }
            }
            Operation::Delete => {
                if node.is_root() {
                    // One deletion must not be able to trigger
                    // adjust_root once the tree latch is gone.
                    if node.is_leaf() {
                        node.size() > 1
                    } else {
                        node.size() > 2
                    }
                } else {
                    node.size() > node.min_size()
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Insert
    // ------------------------------------------------------------------

    fn start_new_tree(
        &self,
        key: u32,
        value: RecordId,
        root_id: &mut MutexGuard<'_, PageId>,
    ) -> Result<bool> {
        let (page, page_id) = self.bpm.new_page()?;
        let mut guard = PageGuard::write(Arc::clone(&self.bpm), page);
        {
            let mut leaf = LeafNode::new(guard.data_mut());
            leaf.init(page_id, INVALID_PAGE_ID, self.leaf_max_size);
            leaf.insert(key, value, self.comparator.as_ref());
        }
        drop(guard);

        **root_id = page_id;
        self.update_root_record(page_id, true)?;
        Ok(true)
    }

    fn insert_into_leaf(
        &self,
        key: u32,
        value: RecordId,
        txn: &mut Transaction,
        tree_latch: &mut TreeLatch,
    ) -> Result<bool> {
        self.find_leaf_write(key, Operation::Insert, txn, tree_latch)?;
        let leaf_index = txn.len() - 1;

        let duplicate = {
            let leaf = LeafNodeRef::new(txn.page(leaf_index).data());
            leaf.lookup(key, self.comparator.as_ref()).is_some()
        };
        if duplicate {
            txn.release_all();
            *tree_latch = None;
            return Ok(false);
        }

        let new_size = {
            let guard = txn.page_mut(leaf_index);
            let mut leaf = LeafNode::new(guard.data_mut());
            leaf.insert(key, value, self.comparator.as_ref())
        };

        if new_size >= self.leaf_max_size as usize {
            let (separator, mut new_leaf_guard) = self.split_leaf(txn.page_mut(leaf_index))?;
            self.insert_into_parent(leaf_index, separator, &mut new_leaf_guard, txn, tree_latch)?;
        }

        txn.release_all();
        *tree_latch = None;
        Ok(true)
    }

    /// Splits an over-full leaf, patching the leaf chain. Returns the
    /// separator key and the write-latched new right sibling.
    fn split_leaf(&self, old_guard: &mut PageGuard) -> Result<(u32, PageGuard)> {
        let (page, new_page_id) = self.bpm.new_page()?;
        let mut new_guard = PageGuard::write(Arc::clone(&self.bpm), page);

        let separator = {
            let mut old_leaf = LeafNode::new(old_guard.data_mut());
            let mut new_leaf = LeafNode::new(new_guard.data_mut());

            new_leaf.init(new_page_id, old_leaf.parent_page_id(), self.leaf_max_size);
            old_leaf.move_half_to(&mut new_leaf);
            new_leaf.set_next_page_id(old_leaf.next_page_id());
            old_leaf.set_next_page_id(new_page_id);
            new_leaf.key_at(0)
        };

        Ok((separator, new_guard))
    }

    /// Splits an over-full internal node. Returns the separator key (the
    /// new node's slot-0 key), the write-latched new right sibling, and
    /// the children whose parent pointer must move to it.
    fn split_internal(&self, old_guard: &mut PageGuard) -> Result<(u32, PageGuard, Vec<PageId>)> {
        let (page, new_page_id) = self.bpm.new_page()?;
        let mut new_guard = PageGuard::write(Arc::clone(&self.bpm), page);

        let (separator, moved) = {
            let mut old_node = InternalNode::new(old_guard.data_mut());
            let mut new_node = InternalNode::new(new_guard.data_mut());

            new_node.init(new_page_id, old_node.parent_page_id(), self.internal_max_size);
            let moved = old_node.move_half_to(&mut new_node);
            (new_node.key_at(0), moved)
        };

        Ok((separator, new_guard, moved))
    }

    /// Links a freshly split-off node into the tree: either by growing a
    /// new root, or by inserting the separator into the held parent and
    /// recursively splitting it when it overflows.
    fn insert_into_parent(
        &self,
        node_index: usize,
        key: u32,
        new_node_guard: &mut PageGuard,
        txn: &mut Transaction,
        tree_latch: &mut TreeLatch,
    ) -> Result<()> {
        let (old_page_id, old_parent_id) = {
            let node = NodeRef::new(txn.page(node_index).data());
            (node.page_id(), node.parent_page_id())
        };
        let new_page_id = new_node_guard.page_id();

        if old_parent_id == INVALID_PAGE_ID {
            // The split node was the root: grow a new one above it.
            let (page, new_root_id) = self.bpm.new_page()?;
            let mut root_guard = PageGuard::write(Arc::clone(&self.bpm), page);
            {
                let mut root = InternalNode::new(root_guard.data_mut());
                root.init(new_root_id, INVALID_PAGE_ID, self.internal_max_size);
                root.populate_new_root(old_page_id, key, new_page_id);
            }
            NodeMut::new(txn.page_mut(node_index).data_mut()).set_parent_page_id(new_root_id);
            NodeMut::new(new_node_guard.data_mut()).set_parent_page_id(new_root_id);
            drop(root_guard);

            let root_latch = tree_latch
                .as_mut()
                .expect("root change without the tree latch");
            **root_latch = new_root_id;
            self.update_root_record(new_root_id, false)?;
            return Ok(());
        }

        // A node that split was unsafe, so its parent is still latched in
        // the transaction, directly above it.
        assert!(node_index > 0, "parent of an unsafe node must be held");
        let parent_index = node_index - 1;

        let new_size = {
            let guard = txn.page_mut(parent_index);
            debug_assert_eq!(guard.page_id(), old_parent_id);
            let mut parent = InternalNode::new(guard.data_mut());
            parent.insert_after(old_page_id, key, new_page_id)
        };
        NodeMut::new(new_node_guard.data_mut()).set_parent_page_id(old_parent_id);

        if new_size <= self.internal_max_size as usize {
            return Ok(());
        }

        let (separator, mut new_parent_guard, moved) =
            self.split_internal(txn.page_mut(parent_index))?;
        self.reparent_children(
            &moved,
            new_parent_guard.page_id(),
            txn,
            Some(new_node_guard),
        )?;
        self.insert_into_parent(parent_index, separator, &mut new_parent_guard, txn, tree_latch)
    }

    // ------------------------------------------------------------------
    // Remove
    // ------------------------------------------------------------------

    fn remove_entry(
        &self,
        key: u32,
        txn: &mut Transaction,
        tree_latch: &mut TreeLatch,
    ) -> Result<()> {
        self.find_leaf_write(key, Operation::Delete, txn, tree_latch)?;
        let leaf_index = txn.len() - 1;

        let present = {
            let leaf = LeafNodeRef::new(txn.page(leaf_index).data());
            leaf.lookup(key, self.comparator.as_ref()).is_some()
        };
        if !present {
            return Ok(());
        }

        {
            let guard = txn.page_mut(leaf_index);
            let mut leaf = LeafNode::new(guard.data_mut());
            leaf.remove_and_delete(key, self.comparator.as_ref());
        }

        if self.coalesce_or_redistribute(leaf_index, txn, tree_latch, None)? {
            let page_id = txn.page(leaf_index).page_id();
            txn.add_deleted_page(page_id);
        }
        Ok(())
    }

    /// Restores the minimum-size invariant of an underfull node by
    /// borrowing from or merging with a sibling, recursing up the held
    /// path as merges shrink parents. Returns whether the node itself
    /// must be deleted.
    ///
    /// `below` is the caller's still-latched sibling from one level
    /// down; pages being reparented or re-rooted may resolve to it.
    fn coalesce_or_redistribute(
        &self,
        node_index: usize,
        txn: &mut Transaction,
        tree_latch: &mut TreeLatch,
        below: Option<&mut PageGuard>,
    ) -> Result<bool> {
        let (node_page_id, parent_page_id, node_size, node_min, node_max) = {
            let node = NodeRef::new(txn.page(node_index).data());
            (
                node.page_id(),
                node.parent_page_id(),
                node.size(),
                node.min_size(),
                node.max_size(),
            )
        };

        if parent_page_id == INVALID_PAGE_ID {
            return self.adjust_root(node_index, txn, tree_latch, below);
        }
        if node_size >= node_min {
            return Ok(false);
        }

        assert!(node_index > 0, "parent of an underfull node must be held");
        let parent_index = node_index - 1;

        let (index_in_parent, sibling_page_id) = {
            let parent_guard = txn.page(parent_index);
            debug_assert_eq!(parent_guard.page_id(), parent_page_id);
            let parent = InternalNodeRef::new(parent_guard.data());
            let index = parent.value_index(node_page_id);
            assert!(index < parent.size(), "node missing from its parent");
            // Left sibling, unless the node is leftmost.
            let sibling = parent.value_at(if index == 0 { 1 } else { index - 1 });
            (index, sibling)
        };

        // Latched under the parent's held write latch, so no descending
        // writer can cross.
        let sibling_page = self.bpm.fetch_page(sibling_page_id)?;
        let mut sibling_guard = PageGuard::write(Arc::clone(&self.bpm), sibling_page);
        let sibling_size = NodeRef::new(sibling_guard.data()).size();

        if node_size + sibling_size > node_max {
            self.redistribute(node_index, &mut sibling_guard, index_in_parent, txn, below)?;
            return Ok(false);
        }

        let delete_node = self.coalesce(node_index, &mut sibling_guard, index_in_parent, txn, below)?;

        if self.coalesce_or_redistribute(parent_index, txn, tree_latch, Some(&mut sibling_guard))? {
            txn.add_deleted_page(parent_page_id);
        }
        Ok(delete_node)
    }

    /// Merges node and sibling into the left of the two and drops their
    /// separator from the parent. Returns whether the node (rather than
    /// the sibling) is the emptied page.
    fn coalesce(
        &self,
        node_index: usize,
        sibling_guard: &mut PageGuard,
        index_in_parent: usize,
        txn: &mut Transaction,
        below: Option<&mut PageGuard>,
    ) -> Result<bool> {
        let sibling_page_id = sibling_guard.page_id();
        let middle_index = if index_in_parent == 0 { 1 } else { index_in_parent };

        let (recipient_page_id, moved_children) = {
            let (parent_guard, node_guard) = txn.parent_and_child_mut(node_index);
            let middle_key = InternalNodeRef::new(parent_guard.data()).key_at(middle_index);
            let node_is_leaf = NodeRef::new(node_guard.data()).is_leaf();

            let (recipient_page_id, moved_children) = if index_in_parent == 0 {
                // Node is leftmost: the right sibling merges into it.
                if node_is_leaf {
                    let mut donor = LeafNode::new(sibling_guard.data_mut());
                    let mut recipient = LeafNode::new(node_guard.data_mut());
                    donor.move_all_to(&mut recipient);
                    (node_guard.page_id(), Vec::new())
                } else {
                    let mut donor = InternalNode::new(sibling_guard.data_mut());
                    let mut recipient = InternalNode::new(node_guard.data_mut());
                    let moved = donor.move_all_to(&mut recipient, middle_key);
                    (node_guard.page_id(), moved)
                }
            } else {
                // Node merges into its left sibling.
                if node_is_leaf {
                    let mut donor = LeafNode::new(node_guard.data_mut());
                    let mut recipient = LeafNode::new(sibling_guard.data_mut());
                    donor.move_all_to(&mut recipient);
                    (sibling_page_id, Vec::new())
                } else {
                    let mut donor = InternalNode::new(node_guard.data_mut());
                    let mut recipient = InternalNode::new(sibling_guard.data_mut());
                    let moved = donor.move_all_to(&mut recipient, middle_key);
                    (sibling_page_id, moved)
                }
            };

            let mut parent = InternalNode::new(parent_guard.data_mut());
            parent.remove(middle_index);

            (recipient_page_id, moved_children)
        };

        if index_in_parent == 0 {
            txn.add_deleted_page(sibling_page_id);
        }

        self.reparent_children(&moved_children, recipient_page_id, txn, below)?;

        Ok(index_in_parent != 0)
    }

    /// Shifts one entry from the sibling into the underfull node and
    /// patches the parent separator, leaving both nodes at or above the
    /// minimum.
    fn redistribute(
        &self,
        node_index: usize,
        sibling_guard: &mut PageGuard,
        index_in_parent: usize,
        txn: &mut Transaction,
        below: Option<&mut PageGuard>,
    ) -> Result<()> {
        let (node_page_id, moved_child) = {
            let (parent_guard, node_guard) = txn.parent_and_child_mut(node_index);
            let node_is_leaf = NodeRef::new(node_guard.data()).is_leaf();
            let node_page_id = node_guard.page_id();

            let moved_child = if node_is_leaf {
                let mut sibling = LeafNode::new(sibling_guard.data_mut());
                let mut node = LeafNode::new(node_guard.data_mut());

                if index_in_parent == 0 {
                    // Borrow the right sibling's first entry.
                    sibling.move_first_to_end_of(&mut node);
                    let separator = sibling.key_at(0);
                    InternalNode::new(parent_guard.data_mut()).set_key_at(1, separator);
                } else {
                    // Borrow the left sibling's last entry.
                    sibling.move_last_to_front_of(&mut node);
                    let separator = node.key_at(0);
                    InternalNode::new(parent_guard.data_mut()).set_key_at(index_in_parent, separator);
                }
                None
            } else {
                let mut sibling = InternalNode::new(sibling_guard.data_mut());
                let mut node = InternalNode::new(node_guard.data_mut());

                if index_in_parent == 0 {
                    // The moved pair carries the parent's separator; the
                    // donor's shifted slot-0 key is the new separator.
                    let middle_key = {
                        let parent = InternalNodeRef::new(parent_guard.data());
                        parent.key_at(1)
                    };
                    let moved = sibling.move_first_to_end_of(&mut node, middle_key);
                    let separator = sibling.key_at(0);
                    InternalNode::new(parent_guard.data_mut()).set_key_at(1, separator);
                    Some(moved)
                } else {
                    let middle_key = {
                        let parent = InternalNodeRef::new(parent_guard.data());
                        parent.key_at(index_in_parent)
                    };
                    // The donor's boundary key becomes the new separator.
                    let separator = sibling.key_at(sibling.size() - 1);
                    let moved = sibling.move_last_to_front_of(&mut node, middle_key);
                    InternalNode::new(parent_guard.data_mut()).set_key_at(index_in_parent, separator);
                    Some(moved)
                }
            };

            (node_page_id, moved_child)
        };

        if let Some(child) = moved_child {
            self.reparent_children(&[child], node_page_id, txn, below)?;
        }
        Ok(())
    }

    /// Collapses the root after deletions: an internal root with a single
    /// child hands the root role to that child; an emptied leaf root
    /// empties the tree. Returns whether the old root must be deleted.
    fn adjust_root(
        &self,
        root_index: usize,
        txn: &mut Transaction,
        tree_latch: &mut TreeLatch,
        below: Option<&mut PageGuard>,
    ) -> Result<bool> {
        let (is_leaf, size) = {
            let node = NodeRef::new(txn.page(root_index).data());
            (node.is_leaf(), node.size())
        };

        if !is_leaf && size == 1 {
            let child_id = {
                let guard = txn.page_mut(root_index);
                let mut root = InternalNode::new(guard.data_mut());
                root.remove_and_return_only_child()
            };

            self.reparent_children(&[child_id], INVALID_PAGE_ID, txn, below)?;

            let root_latch = tree_latch
                .as_mut()
                .expect("root change without the tree latch");
            **root_latch = child_id;
            self.update_root_record(child_id, false)?;
            return Ok(true);
        }

        if is_leaf && size == 0 {
            let root_latch = tree_latch
                .as_mut()
                .expect("root change without the tree latch");
            **root_latch = INVALID_PAGE_ID;
            self.update_root_record(INVALID_PAGE_ID, false)?;
            return Ok(true);
        }

        Ok(false)
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    /// Rewrites the parent pointer of each child through the pool. A
    /// child whose write latch this operation already holds (a page on
    /// the descent path, a fresh split sibling, or the caller's merge
    /// sibling) is written through the held guard; anything else is
    /// fetched and latched here.
    fn reparent_children(
        &self,
        children: &[PageId],
        new_parent: PageId,
        txn: &mut Transaction,
        mut held: Option<&mut PageGuard>,
    ) -> Result<()> {
        for &child in children {
            if let Some(guard) = held.as_deref_mut() {
                if guard.page_id() == child {
                    NodeMut::new(guard.data_mut()).set_parent_page_id(new_parent);
                    continue;
                }
            }
            if let Some(index) = txn.position(child) {
                NodeMut::new(txn.page_mut(index).data_mut()).set_parent_page_id(new_parent);
                continue;
            }

            let page = self.bpm.fetch_page(child)?;
            let mut guard = PageGuard::write(Arc::clone(&self.bpm), page);
            NodeMut::new(guard.data_mut()).set_parent_page_id(new_parent);
        }
        Ok(())
    }

    fn update_root_record(&self, root_id: PageId, insert: bool) -> Result<()> {
        let page = self.bpm.fetch_page(HEADER_PAGE_ID)?;
        let mut guard = PageGuard::write(Arc::clone(&self.bpm), page);
        let mut header = HeaderPage::new(guard.data_mut());

        if insert {
            if !header.insert_record(&self.index_name, root_id) {
                header.update_record(&self.index_name, root_id);
            }
        } else {
            header.update_record(&self.index_name, root_id);
        }
        Ok(())
    }
}
