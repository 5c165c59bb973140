//! Bramble - the storage engine core of a disk-oriented DBMS
//!
//! This crate provides the three load-bearing pieces of a teaching-grade
//! relational database: a buffer pool over a paged disk file, an LRU
//! replacement policy over the pool's frames, and a concurrent B+ tree
//! index whose nodes live in those pages.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): disk I/O
//!   - `DiskManager`: reads, writes and allocates fixed-size pages in a
//!     single database file
//!   - `DiskScheduler`: background worker funneling page I/O through a
//!     request queue
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: page table, free list and pin accounting
//!   - `LruReplacer`: least-recently-used victim selection over
//!     unpinned frames
//!   - `Page`: a frame's bytes, metadata and reader/writer latch
//!   - `PageGuard`: RAII latch + unpin over a fetched page
//!
//! - **Index** (`index`): a disk-resident B+ tree
//!   - `BPlusTree`: point lookup, range iteration, unique insert and
//!     remove, with latch-crabbing concurrency
//!   - `IndexIterator`: in-order iteration over the leaf chain
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bramble::buffer::BufferPoolManager;
//! use bramble::common::{PageId, RecordId, SlotId};
//! use bramble::index::{BPlusTree, IntegerComparator, Transaction};
//! use bramble::storage::disk::DiskManager;
//!
//! let disk_manager = Arc::new(DiskManager::new("demo.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, disk_manager));
//!
//! let tree = BPlusTree::new("demo_pk", bpm, Arc::new(IntegerComparator), 32, 32);
//!
//! let mut txn = Transaction::new();
//! tree.insert(42, RecordId::new(PageId::new(7), SlotId::new(0)), &mut txn)
//!     .unwrap();
//! assert!(tree.get_value(42).unwrap().is_some());
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{BrambleError, FrameId, PageId, RecordId, Result, SlotId};
