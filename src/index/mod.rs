mod btree;
mod btree_page;
mod header_page;
mod internal_page;
mod iterator;
mod key_comparator;
mod leaf_page;
mod transaction;

pub use btree::{BPlusTree, Operation};
pub use btree_page::{BTreePageType, NodeMut, NodeRef};
pub use header_page::{header_page_capacity, HeaderPage, HeaderPageRef};
pub use internal_page::{internal_capacity, InternalNode, InternalNodeRef};
pub use iterator::IndexIterator;
pub use key_comparator::{IntegerComparator, KeyComparator};
pub use leaf_page::{leaf_capacity, LeafNode, LeafNodeRef};
pub use transaction::Transaction;
