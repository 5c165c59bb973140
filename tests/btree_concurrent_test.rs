mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use bramble::common::{BrambleError, PageId, RecordId, SlotId};
use bramble::index::{BPlusTree, IntegerComparator, Transaction};
use common::{check_tree, check_tree_with, create_bpm};
use rand::{Rng, SeedableRng};

fn rid(key: u32) -> RecordId {
    RecordId::new(PageId::new(key), SlotId::new(0))
}

fn create_tree(bpm: &Arc<bramble::buffer::BufferPoolManager>) -> Arc<BPlusTree> {
    Arc::new(BPlusTree::new(
        "concurrent_index",
        Arc::clone(bpm),
        Arc::new(IntegerComparator),
        4,
        4,
    ))
}

/// Retries an operation that aborted because every frame was pinned.
fn with_retry<T>(mut op: impl FnMut() -> bramble::common::Result<T>) -> T {
    loop {
        match op() {
            Ok(value) => return value,
            Err(BrambleError::OutOfMemory) => thread::yield_now(),
            Err(e) => panic!("tree operation failed: {}", e),
        }
    }
}

#[test]
fn test_concurrent_inserts_disjoint_ranges() {
    let (bpm, _temp) = create_bpm(128);
    let tree = create_tree(&bpm);

    const THREADS: u32 = 8;
    const PER_THREAD: u32 = 200;

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                let mut txn = Transaction::new();
                for i in 0..PER_THREAD {
                    let key = t * PER_THREAD + i;
                    let inserted =
                        with_retry(|| tree.insert(key, rid(key), &mut txn));
                    assert!(inserted, "key {} rejected", key);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected: Vec<u32> = (0..THREADS * PER_THREAD).collect();
    assert_eq!(check_tree(&bpm, &tree), expected);
    for key in (0..THREADS * PER_THREAD).step_by(37) {
        assert_eq!(tree.get_value(key).unwrap(), Some(rid(key)));
    }
}

#[test]
fn test_concurrent_removes_disjoint_ranges() {
    let (bpm, _temp) = create_bpm(128);
    let tree = create_tree(&bpm);

    const THREADS: u32 = 8;
    const PER_THREAD: u32 = 100;
    {
        let mut txn = Transaction::new();
        for key in 0..THREADS * PER_THREAD {
            tree.insert(key, rid(key), &mut txn).unwrap();
        }
    }

    // Each thread removes the odd keys of its own range
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                let mut txn = Transaction::new();
                for i in 0..PER_THREAD {
                    let key = t * PER_THREAD + i;
                    if key % 2 == 1 {
                        with_retry(|| tree.remove(key, &mut txn));
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected: Vec<u32> = (0..THREADS * PER_THREAD).filter(|k| k % 2 == 0).collect();
    assert_eq!(check_tree(&bpm, &tree), expected);
}

#[test]
fn test_concurrent_readers_during_writes() {
    let (bpm, _temp) = create_bpm(128);
    let tree = create_tree(&bpm);

    {
        let mut txn = Transaction::new();
        for key in 0..256 {
            tree.insert(key * 2, rid(key * 2), &mut txn).unwrap();
        }
    }

    let writer = {
        let tree = Arc::clone(&tree);
        thread::spawn(move || {
            let mut txn = Transaction::new();
            for key in 0..256 {
                with_retry(|| tree.insert(key * 2 + 1, rid(key * 2 + 1), &mut txn));
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|r| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                let mut rng = rand::rngs::StdRng::seed_from_u64(r);
                for _ in 0..2_000 {
                    let key = rng.gen_range(0..512);
                    // Even keys are always present; odd keys may appear
                    // at any point.
                    let result = with_retry(|| tree.get_value(key));
                    if key % 2 == 0 {
                        assert_eq!(result, Some(rid(key)));
                    } else if let Some(value) = result {
                        assert_eq!(value, rid(key));
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(check_tree(&bpm, &tree), (0..512).collect::<Vec<_>>());
}

/// Random lookups, inserts and deletes from 8 threads over disjoint key
/// ranges, 10,000 operations each. The final tree must match a replay
/// of each thread's operation log against a plain ordered set.
#[test]
fn test_concurrent_mixed_workload_matches_reference() {
    let (bpm, _temp) = create_bpm(128);
    let tree = create_tree(&bpm);

    const THREADS: u64 = 8;
    const RANGE: u32 = 40;
    const OPS: usize = 10_000;

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                let mut rng = rand::rngs::StdRng::seed_from_u64(0xb7a3_0000 + t);
                let mut model = BTreeSet::new();
                let mut txn = Transaction::new();
                let base = t as u32 * RANGE;

                for _ in 0..OPS {
                    let key = base + rng.gen_range(0..RANGE);
                    match rng.gen_range(0..3) {
                        0 => {
                            let inserted = with_retry(|| tree.insert(key, rid(key), &mut txn));
                            assert_eq!(inserted, model.insert(key), "insert {} diverged", key);
                        }
                        1 => {
                            with_retry(|| tree.remove(key, &mut txn));
                            model.remove(&key);
                        }
                        _ => {
                            let found = with_retry(|| tree.get_value(key));
                            assert_eq!(
                                found.is_some(),
                                model.contains(&key),
                                "lookup {} diverged",
                                key
                            );
                        }
                    }
                }
                model
            })
        })
        .collect();

    let mut reference = BTreeSet::new();
    for handle in handles {
        reference.extend(handle.join().unwrap());
    }

    let expected: Vec<u32> = reference.into_iter().collect();
    assert_eq!(check_tree_with(&bpm, &tree, true), expected);
}
