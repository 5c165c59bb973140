use std::collections::{HashMap, LinkedList};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::{BrambleError, FrameId, PageId, Result, INVALID_PAGE_ID, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{LruReplacer, Page};

/// Bookkeeping guarded by the pool mutex for the duration of every call.
struct PoolState {
    /// Maps resident page IDs to the frames holding them
    page_table: HashMap<PageId, FrameId>,
    /// Frames not currently holding any page
    free_list: LinkedList<FrameId>,
    /// Victim selection over unpinned frames
    replacer: LruReplacer,
}

/// BufferPoolManager serves fixed-size pages out of a bounded set of
/// in-memory frames, reading and writing through the disk scheduler on
/// misses and evictions. A single mutex guards the page table, free list
/// and replacer; frame latches are acquired by callers, never by the pool.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// The buffer pool frames
    frames: Vec<Arc<Page>>,
    /// Page table, free list and replacer under one mutex
    state: Mutex<PoolState>,
    /// Disk I/O
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(Page::new(frame_id)));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
                replacer: LruReplacer::new(pool_size),
            }),
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Fetches the requested page, pinning it. On a miss the page is read
    /// from disk into a frame taken from the free list or evicted from
    /// the replacer, writing back the previous occupant if dirty.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Arc<Page>> {
        if page_id == INVALID_PAGE_ID {
            return Err(BrambleError::InvalidPageId(page_id));
        }

        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.as_usize()];
            frame.pin();
            state.replacer.pin(frame_id);
            return Ok(Arc::clone(frame));
        }

        let frame_id = self.take_host_frame(&mut state)?;
        let frame = &self.frames[frame_id.as_usize()];

        let data = self.disk_scheduler.read_page_sync(page_id)?;
        frame.copy_from(&data[..]);
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();

        state.page_table.insert(page_id, frame_id);
        state.replacer.pin(frame_id);

        Ok(Arc::clone(frame))
    }

    /// Drops one pin on the page, folding `is_dirty` into its dirty bit.
    /// The page becomes evictable when its pin count reaches zero.
    /// Returns false if the page is not resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];

        let Some(remaining) = frame.unpin() else {
            return false;
        };
        if is_dirty {
            frame.set_dirty(true);
        }
        if remaining == 0 {
            state.replacer.unpin(frame_id);
        }
        true
    }

    /// Allocates a fresh page on disk and pins it into a zeroed frame.
    pub fn new_page(&self) -> Result<(Arc<Page>, PageId)> {
        let mut state = self.state.lock();

        let frame_id = self.take_host_frame(&mut state)?;
        let frame = &self.frames[frame_id.as_usize()];

        let page_id = self.disk_scheduler.disk_manager().allocate_page()?;

        frame.reset();
        frame.set_page_id(page_id);
        frame.pin();

        state.page_table.insert(page_id, frame_id);
        state.replacer.pin(frame_id);

        Ok((Arc::clone(frame), page_id))
    }

    /// Deletes a page from the pool and deallocates it on disk.
    /// Vacuously succeeds if the page is not resident; fails (false) if
    /// it is still pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id.as_usize()];

        if frame.pin_count() > 0 {
            return Ok(false);
        }

        if frame.is_dirty() {
            let mut data: Box<[u8; PAGE_SIZE]> = Box::new([0u8; PAGE_SIZE]);
            frame.copy_to(&mut data[..]);
            self.disk_scheduler.write_page_sync(page_id, data)?;
        }

        state.page_table.remove(&page_id);
        state.replacer.pin(frame_id);
        frame.reset();
        state.free_list.push_back(frame_id);

        self.disk_scheduler.disk_manager().deallocate_page(page_id)?;

        Ok(true)
    }

    /// Writes the page through to disk and clears its dirty bit.
    /// Pin count and residency are untouched.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Err(BrambleError::InvalidPageId(page_id));
        }

        let state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id.as_usize()];

        let mut data: Box<[u8; PAGE_SIZE]> = Box::new([0u8; PAGE_SIZE]);
        frame.copy_to(&mut data[..]);
        self.disk_scheduler.write_page_sync(page_id, data)?;
        frame.set_dirty(false);

        Ok(true)
    }

    /// Writes every resident page through to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let state = self.state.lock();

        for (&page_id, &frame_id) in state.page_table.iter() {
            let frame = &self.frames[frame_id.as_usize()];
            let mut data: Box<[u8; PAGE_SIZE]> = Box::new([0u8; PAGE_SIZE]);
            frame.copy_to(&mut data[..]);
            self.disk_scheduler.write_page_sync(page_id, data)?;
            frame.set_dirty(false);
        }

        Ok(())
    }

    /// Returns the pin count of a resident page, for tests.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Locates a frame to host a new occupant: free list first, then a
    /// replacer victim (written back if dirty and unmapped).
    fn take_host_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = state.replacer.victim() else {
            return Err(BrambleError::OutOfMemory);
        };
        let frame = &self.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            let mut data: Box<[u8; PAGE_SIZE]> = Box::new([0u8; PAGE_SIZE]);
            frame.copy_to(&mut data[..]);
            self.disk_scheduler.write_page_sync(old_page_id, data)?;
        }

        state.page_table.remove(&old_page_id);
        frame.reset();

        Ok(frame_id)
    }
}
