use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use super::disk_manager::{DiskManager, PageId, INVALID_PAGE_ID};
use super::lru_replacer::LruReplacer;
use crate::extendible_hashing::extendible_hash_table::ExtendibleHashTable;

pub const PAGE_SIZE: usize = 4096;
const PAGE_TABLE_BUCKET_SIZE: usize = 64;

pub type FrameId = usize;

struct Frame {
    page_id: PageId,
    pin_count: usize,
    is_dirty: bool,
    data: Arc<RwLock<[u8; PAGE_SIZE]>>,
}

impl Frame {
    fn new() -> Frame {
        Frame {
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            is_dirty: false,
            data: Arc::new(RwLock::new([0; PAGE_SIZE])),
        }
    }
}

/// Handle to a pinned page. The payload is shared with the owning frame, so
/// writes through [PageRef::write] are visible to every holder of a pin.
///
/// The holder must call [BufferPool::unpin_page] exactly once, passing
/// `is_dirty = true` if the payload was modified.
#[derive(Clone)]
pub struct PageRef {
    page_id: PageId,
    data: Arc<RwLock<[u8; PAGE_SIZE]>>,
}

impl PageRef {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, [u8; PAGE_SIZE]> {
        self.data.read().unwrap()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, [u8; PAGE_SIZE]> {
        self.data.write().unwrap()
    }
}

struct PoolState {
    frames: Vec<Frame>,
    free_list: VecDeque<FrameId>,
    page_table: ExtendibleHashTable<PageId, FrameId>,
    replacer: LruReplacer<FrameId>,
}

/// Fixed-capacity cache of disk pages. Every page access goes through
/// [BufferPool::fetch_page] or [BufferPool::new_page]; frames are recycled
/// from the free list first and from the LRU replacer once the pool is full.
pub struct BufferPool {
    state: Mutex<PoolState>,
    disk_manager: Arc<Mutex<DiskManager>>,
}

impl BufferPool {
    pub fn new(pool_size: usize, disk_manager: Arc<Mutex<DiskManager>>) -> BufferPool {
        let frames = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list = (0..pool_size).collect();
        BufferPool {
            state: Mutex::new(PoolState {
                frames,
                free_list,
                page_table: ExtendibleHashTable::new(PAGE_TABLE_BUCKET_SIZE),
                replacer: LruReplacer::new(pool_size),
            }),
            disk_manager,
        }
    }

    /// Pins the page `page_id`, reading it from disk if it is not resident.
    /// Returns [None] when no frame can be reclaimed because every page is
    /// pinned.
    pub fn fetch_page(&self, page_id: PageId) -> io::Result<Option<PageRef>> {
        let mut state = self.state.lock().unwrap();
        if let Some(frame_id) = state.page_table.find(&page_id) {
            state.replacer.erase(&frame_id);
            let frame = &mut state.frames[frame_id];
            frame.pin_count += 1;
            return Ok(Some(PageRef {
                page_id,
                data: Arc::clone(&frame.data),
            }));
        }

        let Some(frame_id) = Self::pick_victim(&mut state) else {
            return Ok(None);
        };
        self.retarget_frame(&mut state, frame_id, page_id)?;
        {
            let frame = &state.frames[frame_id];
            let mut data = frame.data.write().unwrap();
            self.disk_manager
                .lock()
                .unwrap()
                .read_page(page_id, &mut data)?;
        }
        let frame = &mut state.frames[frame_id];
        frame.page_id = page_id;
        frame.pin_count = 1;
        frame.is_dirty = false;
        Ok(Some(PageRef {
            page_id,
            data: Arc::clone(&frame.data),
        }))
    }

    /// Allocates a fresh page on disk and pins it into a zeroed frame.
    /// Returns [None] when every frame is pinned.
    pub fn new_page(&self) -> io::Result<Option<PageRef>> {
        let mut state = self.state.lock().unwrap();
        let Some(frame_id) = Self::pick_victim(&mut state) else {
            return Ok(None);
        };
        let page_id = self.disk_manager.lock().unwrap().allocate_page();
        self.retarget_frame(&mut state, frame_id, page_id)?;
        let frame = &mut state.frames[frame_id];
        frame.page_id = page_id;
        frame.pin_count = 1;
        frame.is_dirty = false;
        frame.data.write().unwrap().fill(0);
        Ok(Some(PageRef {
            page_id,
            data: Arc::clone(&frame.data),
        }))
    }

    /// Releases one pin on `page_id`, or-ing `is_dirty` into the frame's
    /// dirty flag. The flag stays set until the page is written back.
    ///
    /// Returns `false`, changing nothing, when the page is not resident or
    /// its pin count is already zero.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.state.lock().unwrap();
        let Some(frame_id) = state.page_table.find(&page_id) else {
            return false;
        };
        let frame = &mut state.frames[frame_id];
        if frame.pin_count == 0 {
            return false;
        }
        frame.is_dirty |= is_dirty;
        frame.pin_count -= 1;
        if frame.pin_count == 0 {
            state.replacer.insert(frame_id);
        }
        true
    }

    /// Writes `page_id` back to disk if it is resident and dirty, clearing
    /// the dirty flag. Returns `false` when the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> io::Result<bool> {
        let mut state = self.state.lock().unwrap();
        if page_id == INVALID_PAGE_ID {
            return Ok(false);
        }
        let Some(frame_id) = state.page_table.find(&page_id) else {
            return Ok(false);
        };
        let frame = &mut state.frames[frame_id];
        if frame.is_dirty {
            {
                let data = frame.data.read().unwrap();
                self.disk_manager.lock().unwrap().write_page(page_id, &data)?;
            }
            frame.is_dirty = false;
        }
        Ok(true)
    }

    /// Drops `page_id` from the pool and deallocates it on disk. Returns
    /// `false` when the page is resident and still pinned.
    pub fn delete_page(&self, page_id: PageId) -> io::Result<bool> {
        let mut state = self.state.lock().unwrap();
        if let Some(frame_id) = state.page_table.find(&page_id) {
            if state.frames[frame_id].pin_count > 0 {
                return Ok(false);
            }
            state.replacer.erase(&frame_id);
            state.page_table.remove(&page_id);
            let frame = &mut state.frames[frame_id];
            frame.page_id = INVALID_PAGE_ID;
            frame.is_dirty = false;
            frame.data.write().unwrap().fill(0);
            state.free_list.push_back(frame_id);
            debug!("page {} dropped from frame {}", page_id, frame_id);
        }
        self.disk_manager.lock().unwrap().deallocate_page(page_id);
        Ok(true)
    }

    /// Writes every resident dirty page back to disk. Pins and residency are
    /// left untouched.
    pub fn flush_all_pages(&self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut disk_manager = self.disk_manager.lock().unwrap();
        for frame in state.frames.iter_mut() {
            if frame.is_dirty && frame.page_id != INVALID_PAGE_ID {
                {
                    let data = frame.data.read().unwrap();
                    disk_manager.write_page(frame.page_id, &data)?;
                }
                frame.is_dirty = false;
            }
        }
        Ok(())
    }

    fn pick_victim(state: &mut PoolState) -> Option<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            debug_assert_eq!(state.frames[frame_id].page_id, INVALID_PAGE_ID);
            debug_assert_eq!(state.frames[frame_id].pin_count, 0);
            return Some(frame_id);
        }
        let frame_id = state.replacer.victim()?;
        debug_assert_eq!(state.frames[frame_id].pin_count, 0);
        Some(frame_id)
    }

    /// Points `frame_id` at `new_page_id`, writing the old contents back to
    /// disk first when they are dirty.
    fn retarget_frame(
        &self,
        state: &mut PoolState,
        frame_id: FrameId,
        new_page_id: PageId,
    ) -> io::Result<()> {
        let old_page_id = state.frames[frame_id].page_id;
        if state.frames[frame_id].is_dirty && old_page_id != INVALID_PAGE_ID {
            debug!(
                "writing dirty page {} back before frame {} is reused",
                old_page_id, frame_id
            );
            let data = state.frames[frame_id].data.read().unwrap();
            self.disk_manager
                .lock()
                .unwrap()
                .write_page(old_page_id, &data)?;
        }
        if old_page_id != INVALID_PAGE_ID {
            state.page_table.remove(&old_page_id);
        }
        state.page_table.insert(new_page_id, frame_id);
        Ok(())
    }
}
