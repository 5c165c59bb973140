use crate::common::{PageId, PAGE_SIZE};

use super::btree_page::{read_u32, write_u32};

// Layout: record count u32, then fixed-size records of
// (name bytes, zero padded | root page id).
const RECORD_COUNT_OFFSET: usize = 0;
const RECORDS_OFFSET: usize = 4;
const NAME_SIZE: usize = 32;
const RECORD_SIZE: usize = NAME_SIZE + 4;

/// Maximum number of (name, root id) records the header page can hold.
pub fn header_page_capacity() -> usize {
    (PAGE_SIZE - RECORDS_OFFSET) / RECORD_SIZE
}

/// Overlay over the reserved header page mapping index names to their
/// root page ids.
pub struct HeaderPage<'a> {
    data: &'a mut [u8],
}

impl<'a> HeaderPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn record_count(&self) -> usize {
        read_u32(self.data, RECORD_COUNT_OFFSET) as usize
    }

    /// Adds a record. Fails if the name is already present or the page
    /// is full.
    pub fn insert_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        assert!(name.len() < NAME_SIZE, "index name too long");

        if self.find_record(name).is_some() {
            return false;
        }
        let count = self.record_count();
        if count >= header_page_capacity() {
            return false;
        }

        let offset = RECORDS_OFFSET + count * RECORD_SIZE;
        self.data[offset..offset + NAME_SIZE].fill(0);
        self.data[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        write_u32(self.data, offset + NAME_SIZE, root_page_id.as_u32());
        write_u32(self.data, RECORD_COUNT_OFFSET, (count + 1) as u32);
        true
    }

    /// Rewrites the root id of an existing record.
    pub fn update_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        match self.find_record(name) {
            Some(index) => {
                let offset = RECORDS_OFFSET + index * RECORD_SIZE;
                write_u32(self.data, offset + NAME_SIZE, root_page_id.as_u32());
                true
            }
            None => false,
        }
    }

    /// Drops a record, keeping the remaining records packed.
    pub fn delete_record(&mut self, name: &str) -> bool {
        let Some(index) = self.find_record(name) else {
            return false;
        };
        let count = self.record_count();

        for i in index..count - 1 {
            let from = RECORDS_OFFSET + (i + 1) * RECORD_SIZE;
            let to = RECORDS_OFFSET + i * RECORD_SIZE;
            let record: [u8; RECORD_SIZE] = self.data[from..from + RECORD_SIZE].try_into().unwrap();
            self.data[to..to + RECORD_SIZE].copy_from_slice(&record);
        }
        write_u32(self.data, RECORD_COUNT_OFFSET, (count - 1) as u32);
        true
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        self.find_record(name).map(|index| {
            let offset = RECORDS_OFFSET + index * RECORD_SIZE;
            PageId::new(read_u32(self.data, offset + NAME_SIZE))
        })
    }

    fn find_record(&self, name: &str) -> Option<usize> {
        find_record_in(self.data, name)
    }
}

/// Read-only overlay over the header page.
pub struct HeaderPageRef<'a> {
    data: &'a [u8],
}

impl<'a> HeaderPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn record_count(&self) -> usize {
        read_u32(self.data, RECORD_COUNT_OFFSET) as usize
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        find_record_in(self.data, name).map(|index| {
            let offset = RECORDS_OFFSET + index * RECORD_SIZE;
            PageId::new(read_u32(self.data, offset + NAME_SIZE))
        })
    }
}

fn find_record_in(data: &[u8], name: &str) -> Option<usize> {
    assert!(name.len() < NAME_SIZE, "index name too long");
    let count = read_u32(data, RECORD_COUNT_OFFSET) as usize;

    let mut name_bytes = [0u8; NAME_SIZE];
    name_bytes[..name.len()].copy_from_slice(name.as_bytes());

    (0..count).find(|&index| {
        let offset = RECORDS_OFFSET + index * RECORD_SIZE;
        data[offset..offset + NAME_SIZE] == name_bytes
    })
}
