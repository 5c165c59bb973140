#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use bramble::buffer::{BufferPoolManager, PageGuard};
use bramble::common::{PageId, INVALID_PAGE_ID};
use bramble::index::{BPlusTree, InternalNodeRef, LeafNodeRef, NodeRef};
use bramble::storage::disk::DiskManager;
use tempfile::NamedTempFile;

pub fn create_bpm(pool_size: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(pool_size, disk_manager));
    (bpm, temp_file)
}

/// Walks the whole tree, asserting the structural invariants, and
/// returns every key in leaf-chain order.
pub fn check_tree(bpm: &Arc<BufferPoolManager>, tree: &BPlusTree) -> Vec<u32> {
    check_tree_with(bpm, tree, true)
}

/// As `check_tree`; `strict_sizes` additionally enforces the per-node
/// min/max size bounds.
pub fn check_tree_with(
    bpm: &Arc<BufferPoolManager>,
    tree: &BPlusTree,
    strict_sizes: bool,
) -> Vec<u32> {
    let root_id = tree.root_page_id();
    if root_id == INVALID_PAGE_ID {
        assert!(tree.is_empty());
        return Vec::new();
    }

    let mut leaves = Vec::new();
    check_subtree(
        bpm,
        root_id,
        INVALID_PAGE_ID,
        true,
        None,
        None,
        strict_sizes,
        &mut leaves,
    );

    // The leaf chain must visit exactly the leaves the tree structure
    // reaches, in order, with strictly ascending keys overall.
    let mut chained = Vec::new();
    let mut keys = Vec::new();
    let mut current = *leaves.first().expect("tree with no leaves");
    loop {
        let page = bpm.fetch_page(current).unwrap();
        let guard = PageGuard::read(Arc::clone(bpm), page);
        let leaf = LeafNodeRef::new(guard.data());
        chained.push(current);
        for i in 0..leaf.size() {
            keys.push(leaf.key_at(i));
        }
        let next = leaf.next_page_id();
        drop(guard);
        if next == INVALID_PAGE_ID {
            break;
        }
        current = next;
    }

    assert_eq!(chained, leaves, "leaf chain disagrees with the tree structure");
    assert!(
        keys.windows(2).all(|w| w[0] < w[1]),
        "leaf keys are not strictly ascending"
    );
    keys
}

#[allow(clippy::too_many_arguments)]
fn check_subtree(
    bpm: &Arc<BufferPoolManager>,
    page_id: PageId,
    expected_parent: PageId,
    is_root: bool,
    lower: Option<u32>,
    upper: Option<u32>,
    strict_sizes: bool,
    leaves: &mut Vec<PageId>,
) {
    let page = bpm.fetch_page(page_id).unwrap();
    let guard = PageGuard::read(Arc::clone(bpm), page);

    let node = NodeRef::new(guard.data());
    assert_eq!(node.page_id(), page_id, "header page id mismatch");
    assert_eq!(
        node.parent_page_id(),
        expected_parent,
        "parent pointer mismatch for {}",
        page_id
    );
    if strict_sizes && !is_root {
        assert!(
            node.size() >= node.min_size(),
            "{} below minimum size",
            page_id
        );
        assert!(
            node.size() <= node.max_size(),
            "{} above maximum size",
            page_id
        );
    }

    if node.is_leaf() {
        let leaf = LeafNodeRef::new(guard.data());
        assert!(leaf.size() >= 1, "empty leaf {} left in the tree", page_id);
        for i in 0..leaf.size() {
            let key = leaf.key_at(i);
            if i > 0 {
                assert!(leaf.key_at(i - 1) < key, "leaf keys out of order");
            }
            if let Some(lo) = lower {
                assert!(key >= lo, "leaf key below its subtree bound");
            }
            if let Some(hi) = upper {
                assert!(key < hi, "leaf key above its subtree bound");
            }
        }
        leaves.push(page_id);
        return;
    }

    let internal = InternalNodeRef::new(guard.data());
    let size = internal.size();
    assert!(size >= 2, "internal node {} with fewer than two children", page_id);

    let mut seen = HashSet::new();
    for i in 0..size {
        assert!(
            seen.insert(internal.value_at(i)),
            "duplicate child in internal node {}",
            page_id
        );
    }
    for i in 1..size {
        let key = internal.key_at(i);
        if i > 1 {
            assert!(internal.key_at(i - 1) < key, "separator keys out of order");
        }
        if let Some(lo) = lower {
            assert!(key >= lo, "separator below its subtree bound");
        }
        if let Some(hi) = upper {
            assert!(key < hi, "separator above its subtree bound");
        }
    }

    let children: Vec<(PageId, Option<u32>, Option<u32>)> = (0..size)
        .map(|i| {
            let lo = if i == 0 { lower } else { Some(internal.key_at(i)) };
            let hi = if i + 1 < size {
                Some(internal.key_at(i + 1))
            } else {
                upper
            };
            (internal.value_at(i), lo, hi)
        })
        .collect();
    drop(guard);

    for (child, lo, hi) in children {
        check_subtree(bpm, child, page_id, false, lo, hi, strict_sizes, leaves);
    }
}
