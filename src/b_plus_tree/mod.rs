use std::io;

use bincode::{Decode, Encode};
use thiserror::Error;

use crate::disk_management::buffer_pool::BufferPool;
use crate::disk_management::disk_manager::PageId;

pub mod b_plus_tree_internal_page;

pub const INTERNAL_PAGE_TYPE: u8 = 0;
pub const LEAF_PAGE_TYPE: u8 = 1;

pub(crate) const HEADER_SIZE: usize = 21;
pub(crate) const CHILD_PID_SIZE: usize = 4;

/// Header prefix shared by every B+ tree page (21 bytes):
/// ---------------------------------------------------------------------------------------
/// | PAGE_ID (4) | PAGE_TYPE (1) | LSN (4) | SIZE (4) | MAX_SIZE (4) | PARENT_PAGE_ID (4) |
/// ---------------------------------------------------------------------------------------
///
/// Leaf pages append their own fields after these; the prefix is identical,
/// so the parent pointer of a page can be rewritten without knowing its kind.
#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct BPlusTreePageHeader {
    pub page_id: u32,
    pub page_type: u8,
    pub lsn: u32,
    pub size: u32,
    pub max_size: u32,
    pub parent_page_id: u32,
}

/// Failure of a structural page operation. Index-contract violations are
/// programmer errors and assert instead.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("all buffer pool frames are pinned")]
    AllFramesPinned,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Rewrites the parent pointer of the page `child_page_id`, whatever its
/// page type, and unpins it dirty.
pub(crate) fn update_parent_pointer(
    pool: &BufferPool,
    child_page_id: PageId,
    parent_page_id: PageId,
) -> Result<(), IndexError> {
    let page = pool
        .fetch_page(child_page_id)?
        .ok_or(IndexError::AllFramesPinned)?;
    {
        let mut data = page.write();
        let bincode_config = bincode::config::standard().with_fixed_int_encoding();
        let mut header: BPlusTreePageHeader =
            bincode::decode_from_slice(&data[..HEADER_SIZE], bincode_config)
                .expect("could not decode the page header")
                .0;
        header.parent_page_id = parent_page_id;
        bincode::encode_into_slice(&header, &mut data[..HEADER_SIZE], bincode_config)
            .expect("the header always fits its slot");
    }
    pool.unpin_page(child_page_id, true);
    Ok(())
}
