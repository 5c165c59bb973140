use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::{BufferPoolManager, Page};

enum Latch {
    Read(RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>),
    Write(RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>),
}

/// RAII guard pairing a frame latch with the page's pin.
///
/// Constructed by the caller around a page returned from
/// `BufferPoolManager::fetch_page` / `new_page` (which pin it). Dropping
/// the guard releases the latch first, then unpins the page, passing
/// along whether `data_mut` was ever handed out.
pub struct PageGuard {
    bpm: Arc<BufferPoolManager>,
    page_id: PageId,
    /// Keeps the latched frame alive for the 'static lock guards
    _page: Arc<Page>,
    latch: Option<Latch>,
    is_dirty: bool,
}

impl PageGuard {
    /// Latches `page` for reading. Blocks while a writer holds the latch.
    pub fn read(bpm: Arc<BufferPoolManager>, page: Arc<Page>) -> Self {
        let guard = page.data.read();
        // Safety: the guard borrows from `page`, which this struct keeps
        // alive via Arc for at least as long as the guard.
        let guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { std::mem::transmute(guard) };

        Self {
            bpm,
            page_id: page.page_id(),
            _page: page,
            latch: Some(Latch::Read(guard)),
            is_dirty: false,
        }
    }

    /// Latches `page` for writing. Blocks while any latch is held.
    pub fn write(bpm: Arc<BufferPoolManager>, page: Arc<Page>) -> Self {
        let guard = page.data.write();
        // Safety: as in `read`, the Arc outlives the transmuted guard.
        let guard: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { std::mem::transmute(guard) };

        Self {
            bpm,
            page_id: page.page_id(),
            _page: page,
            latch: Some(Latch::Write(guard)),
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        match self.latch.as_ref().expect("latch released") {
            Latch::Read(guard) => &guard[..],
            Latch::Write(guard) => &guard[..],
        }
    }

    /// Returns mutable page bytes and marks the page dirty.
    /// Panics on a read-latched guard.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.is_dirty = true;
        match self.latch.as_mut().expect("latch released") {
            Latch::Read(_) => panic!("data_mut on a read-latched page"),
            Latch::Write(guard) => &mut guard[..],
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        // Release the latch before unpinning.
        self.latch.take();
        self.bpm.unpin_page(self.page_id, self.is_dirty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::DiskManager;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        (Arc::new(BufferPoolManager::new(pool_size, dm)), temp_file)
    }

    #[test]
    fn test_page_guard_read_unpins_clean() {
        let (bpm, _temp) = create_bpm(10);
        let (page, page_id) = bpm.new_page().unwrap();

        {
            let guard = PageGuard::read(bpm.clone(), page);
            assert_eq!(guard.page_id(), page_id);
            assert_eq!(bpm.get_pin_count(page_id), Some(1));
        }

        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn test_page_guard_write_marks_dirty() {
        let (bpm, _temp) = create_bpm(10);
        let (page, page_id) = bpm.new_page().unwrap();

        {
            let mut guard = PageGuard::write(bpm.clone(), page);
            guard.data_mut()[0] = 42;
            assert!(guard.is_dirty());
        }

        let page = bpm.fetch_page(page_id).unwrap();
        let guard = PageGuard::read(bpm.clone(), page);
        assert_eq!(guard.data()[0], 42);
    }

    #[test]
    fn test_page_guard_untouched_write_stays_clean() {
        let (bpm, _temp) = create_bpm(10);
        let (page, _page_id) = bpm.new_page().unwrap();

        let guard = PageGuard::write(bpm.clone(), page);
        assert!(!guard.is_dirty());
    }
}
