use std::cmp::Ordering;

/// Ordering of index keys. The tree is parameterized with one of these
/// so that key collation is a property of the index, not of the node
/// page layout.
pub trait KeyComparator: Send + Sync {
    fn compare(&self, a: u32, b: u32) -> Ordering;
}

/// Natural integer order.
pub struct IntegerComparator;

impl KeyComparator for IntegerComparator {
    fn compare(&self, a: u32, b: u32) -> Ordering {
        a.cmp(&b)
    }
}
