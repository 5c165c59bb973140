use std::sync::Arc;

use bramble::buffer::BufferPoolManager;
use bramble::common::{PageId, RecordId, SlotId};
use bramble::index::{BPlusTree, IntegerComparator, Transaction};
use bramble::storage::disk::DiskManager;

fn main() {
    println!("Bramble - a disk-oriented storage engine core");
    println!("=============================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("Failed to create disk manager"));
    println!("Created disk manager for: {}", db_path);

    let bpm = Arc::new(BufferPoolManager::new(16, disk_manager));
    println!("Created buffer pool manager with 16 frames\n");

    let tree = BPlusTree::new("demo_pk", bpm.clone(), Arc::new(IntegerComparator), 4, 4);

    let mut txn = Transaction::new();
    for key in [5, 3, 8, 1, 9, 4, 7, 2, 6] {
        let value = RecordId::new(PageId::new(100 + key), SlotId::new(0));
        tree.insert(key, value, &mut txn).expect("insert failed");
        println!("Inserted key {}", key);
    }

    println!("\nPoint lookups:");
    for key in [1, 6, 9] {
        let value = tree.get_value(key).expect("lookup failed");
        println!("  get_value({}) = {:?}", key, value);
    }

    tree.remove(5, &mut txn).expect("remove failed");
    println!("\nRemoved key 5");

    print!("In-order scan: ");
    let mut iter = tree.begin().expect("begin failed");
    while !iter.is_end() {
        let (key, _) = iter.item();
        print!("{} ", key);
        iter.advance().expect("advance failed");
    }
    println!();

    bpm.flush_all_pages().expect("flush failed");
    println!("\nFlushed all pages to disk");

    std::fs::remove_file(db_path).ok();
    println!("Demo completed successfully!");
}
