use std::mem;

use bincode::{Decode, Encode};

use super::{
    update_parent_pointer, BPlusTreePageHeader, IndexError, CHILD_PID_SIZE, HEADER_SIZE,
    INTERNAL_PAGE_TYPE,
};
use crate::disk_management::buffer_pool::{BufferPool, PageRef, PAGE_SIZE};
use crate::disk_management::disk_manager::PageId;

#[derive(Debug, Clone, Encode, Decode)]
struct InternalEntry<K> {
    key: K,
    child_page_id: u32,
}

/// An internal B+ tree node: the shared header followed by `size` pairs of
/// `(key, child_page_id)`, where the key of the pair at index 0 is a
/// placeholder and never compared.
///
/// Content:
/// ----------------------------------------------------------------------------
/// | HEADER (21) | KEY (k) 1 + CHILD_PID (4) 1 | ... | KEY (k) n + CHILD_PID (4) n |
/// ----------------------------------------------------------------------------
///
/// The page is decoded into this value, mutated, and written back with
/// [InternalPage::write_to]; operations that move entries between pages
/// re-parent the affected children through the buffer pool as they go.
#[derive(Debug)]
pub struct InternalPage<K> {
    header: BPlusTreePageHeader,
    entries: Vec<InternalEntry<K>>,
}

impl<K> InternalPage<K>
where
    K: Ord + Clone + Default + Encode + Decode<()>,
{
    /// A freshly initialized, empty internal page. The capacity leaves one
    /// spare slot beyond `max_size` for the transient overflow between an
    /// insert and the split resolving it.
    pub fn new(page_id: PageId, parent_page_id: PageId) -> InternalPage<K> {
        let entry_size = mem::size_of::<K>() + CHILD_PID_SIZE;
        let max_size = (PAGE_SIZE - HEADER_SIZE) / entry_size - 1;
        InternalPage {
            header: BPlusTreePageHeader {
                page_id,
                page_type: INTERNAL_PAGE_TYPE,
                lsn: 0,
                size: 0,
                max_size: max_size as u32,
                parent_page_id,
            },
            entries: Vec::with_capacity(max_size + 1),
        }
    }

    /// Decodes the internal page stored in `page`.
    pub fn read_from(page: &PageRef) -> InternalPage<K> {
        let data = page.read();
        let bincode_config = bincode::config::standard().with_fixed_int_encoding();
        let header: BPlusTreePageHeader =
            bincode::decode_from_slice(&data[..HEADER_SIZE], bincode_config)
                .expect("could not decode the internal page header")
                .0;
        assert_eq!(
            header.page_type, INTERNAL_PAGE_TYPE,
            "page {} is not an internal page",
            header.page_id
        );

        let entry_size = mem::size_of::<K>() + CHILD_PID_SIZE;
        let mut entries = Vec::with_capacity(header.max_size as usize + 1);
        for index in 0..header.size as usize {
            let start = HEADER_SIZE + index * entry_size;
            entries.push(
                bincode::decode_from_slice(&data[start..start + entry_size], bincode_config)
                    .expect("could not decode an internal page entry")
                    .0,
            );
        }
        InternalPage { header, entries }
    }

    /// Encodes this page back into `page`. Stale bytes beyond `size` entries
    /// are left in place, the size field bounds every read.
    pub fn write_to(&self, page: &PageRef) {
        let bincode_config = bincode::config::standard().with_fixed_int_encoding();
        let mut data = page.write();
        bincode::encode_into_slice(&self.header, &mut data[..HEADER_SIZE], bincode_config)
            .expect("the header always fits its slot");
        let entry_size = mem::size_of::<K>() + CHILD_PID_SIZE;
        for (index, entry) in self.entries.iter().enumerate() {
            let start = HEADER_SIZE + index * entry_size;
            bincode::encode_into_slice(entry, &mut data[start..start + entry_size], bincode_config)
                .expect("entries always fit their slots");
        }
    }

    pub fn size(&self) -> usize {
        self.header.size as usize
    }

    pub fn max_size(&self) -> usize {
        self.header.max_size as usize
    }

    pub fn page_id(&self) -> PageId {
        self.header.page_id
    }

    pub fn parent_page_id(&self) -> PageId {
        self.header.parent_page_id
    }

    pub fn key_at(&self, index: usize) -> &K {
        assert!(index < self.size(), "key index {} out of range", index);
        &self.entries[index].key
    }

    pub fn set_key_at(&mut self, index: usize, key: K) {
        assert!(index < self.size(), "key index {} out of range", index);
        self.entries[index].key = key;
    }

    pub fn value_at(&self, index: usize) -> PageId {
        assert!(index < self.size(), "child index {} out of range", index);
        self.entries[index].child_page_id
    }

    /// Index of the entry whose child is `child_page_id`, scanning linearly.
    pub fn value_index(&self, child_page_id: PageId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.child_page_id == child_page_id)
    }

    /// The child whose subtree covers `key`: the entry with the largest index
    /// whose key compares less than or equal, searched over `[1, size - 1]`
    /// since the key at index 0 is a placeholder.
    pub fn lookup(&self, key: &K) -> PageId {
        assert!(self.size() > 1, "lookup on a page with a single child");
        let mut start = 1;
        let mut end = self.size() - 1;
        while start <= end {
            let mid = start + (end - start) / 2;
            if self.entries[mid].key > *key {
                end = mid - 1;
            } else {
                start = mid + 1;
            }
        }
        self.entries[start - 1].child_page_id
    }

    /// Turns this empty page into a root with two children separated by
    /// `new_key`. Called when a split propagates past the old root.
    pub fn populate_new_root(&mut self, old_child: PageId, new_key: K, new_child: PageId) {
        self.entries.clear();
        self.entries.push(InternalEntry {
            key: K::default(),
            child_page_id: old_child,
        });
        self.entries.push(InternalEntry {
            key: new_key,
            child_page_id: new_child,
        });
        self.header.size = 2;
    }

    /// Inserts `(new_key, new_child)` immediately after the entry whose child
    /// is `old_child` and returns the new size. The caller resolves a
    /// resulting overflow with [InternalPage::move_half_to].
    pub fn insert_node_after(&mut self, old_child: PageId, new_key: K, new_child: PageId) -> usize {
        let index = self
            .value_index(old_child)
            .expect("the old child must be present in this page");
        self.entries.insert(
            index + 1,
            InternalEntry {
                key: new_key,
                child_page_id: new_child,
            },
        );
        self.header.size += 1;
        self.size()
    }

    /// Moves the upper half of an overflowed page into the empty `recipient`.
    /// The first key moved along is the pivot the caller pushes up.
    pub fn move_half_to(
        &mut self,
        recipient: &mut InternalPage<K>,
        pool: &BufferPool,
    ) -> Result<(), IndexError> {
        let total = self.max_size() + 1;
        assert_eq!(self.size(), total, "only an overflowed page is split");
        assert_eq!(recipient.size(), 0, "the split recipient must be empty");

        let copy_index = total / 2;
        for entry in &self.entries[copy_index..] {
            update_parent_pointer(pool, entry.child_page_id, recipient.page_id())?;
        }
        recipient.entries.extend(self.entries.drain(copy_index..));
        self.header.size = copy_index as u32;
        recipient.header.size = (total - copy_index) as u32;
        Ok(())
    }

    /// Drops the entry at `index`. The child itself is not touched.
    pub fn remove(&mut self, index: usize) {
        assert!(index < self.size(), "entry index {} out of range", index);
        self.entries.remove(index);
        self.header.size -= 1;
    }

    /// Returns the single remaining child and empties the page. Used when
    /// the root has collapsed to one child.
    pub fn remove_and_return_only_child(&mut self) -> PageId {
        assert_eq!(self.size(), 1, "the page must hold exactly one child");
        self.header.size = 0;
        self.entries.pop().unwrap().child_page_id
    }

    /// Merges this page into `recipient`. The separator key at
    /// `index_in_parent` is pulled down into the placeholder slot first, so
    /// every appended entry carries a real key; the parent itself is left to
    /// the caller and unpinned clean.
    pub fn move_all_to(
        &mut self,
        recipient: &mut InternalPage<K>,
        index_in_parent: usize,
        pool: &BufferPool,
    ) -> Result<(), IndexError> {
        assert!(
            recipient.size() + self.size() <= recipient.max_size(),
            "the merged page would overflow"
        );

        let parent_page = pool
            .fetch_page(self.parent_page_id())?
            .ok_or(IndexError::AllFramesPinned)?;
        let parent = InternalPage::<K>::read_from(&parent_page);
        let separator = parent.key_at(index_in_parent).clone();
        pool.unpin_page(parent_page.page_id(), false);
        self.set_key_at(0, separator);

        for entry in &self.entries {
            update_parent_pointer(pool, entry.child_page_id, recipient.page_id())?;
        }
        let moved = self.size();
        recipient.entries.append(&mut self.entries);
        recipient.header.size += moved as u32;
        self.header.size = 0;
        Ok(())
    }

    /// Shifts this page's first entry to the back of `recipient` and refreshes
    /// the separator in the parent with the new first key.
    pub fn move_first_to_end_of(
        &mut self,
        recipient: &mut InternalPage<K>,
        pool: &BufferPool,
    ) -> Result<(), IndexError> {
        assert!(self.size() > 1, "redistribution needs a spare entry");
        let entry = self.entries.remove(0);
        self.header.size -= 1;
        let child_page_id = entry.child_page_id;
        recipient.copy_last_from(entry);
        update_parent_pointer(pool, child_page_id, recipient.page_id())?;

        let parent_page = pool
            .fetch_page(self.parent_page_id())?
            .ok_or(IndexError::AllFramesPinned)?;
        let mut parent = InternalPage::<K>::read_from(&parent_page);
        let slot = parent
            .value_index(self.page_id())
            .expect("the parent must reference this page");
        parent.set_key_at(slot, self.entries[0].key.clone());
        parent.write_to(&parent_page);
        pool.unpin_page(parent_page.page_id(), true);
        Ok(())
    }

    /// Shifts this page's last entry to the front of `recipient` and rewrites
    /// the parent's separator at `parent_index` with the moved key.
    pub fn move_last_to_front_of(
        &mut self,
        recipient: &mut InternalPage<K>,
        parent_index: usize,
        pool: &BufferPool,
    ) -> Result<(), IndexError> {
        assert!(self.size() > 1, "redistribution needs a spare entry");
        let entry = self.entries.pop().unwrap();
        self.header.size -= 1;
        recipient.copy_first_from(entry, parent_index, pool)
    }

    fn copy_last_from(&mut self, entry: InternalEntry<K>) {
        assert!(self.size() < self.max_size(), "no room to append an entry");
        self.entries.push(entry);
        self.header.size += 1;
    }

    fn copy_first_from(
        &mut self,
        entry: InternalEntry<K>,
        parent_index: usize,
        pool: &BufferPool,
    ) -> Result<(), IndexError> {
        assert!(self.size() + 1 < self.max_size(), "no room to prepend an entry");
        self.entries.insert(0, entry);
        self.header.size += 1;
        update_parent_pointer(pool, self.entries[0].child_page_id, self.page_id())?;

        let parent_page = pool
            .fetch_page(self.parent_page_id())?
            .ok_or(IndexError::AllFramesPinned)?;
        let mut parent = InternalPage::<K>::read_from(&parent_page);
        parent.set_key_at(parent_index, self.entries[0].key.clone());
        parent.write_to(&parent_page);
        pool.unpin_page(parent_page.page_id(), true);
        Ok(())
    }

    #[cfg(test)]
    fn set_max_size(&mut self, max_size: u32) {
        self.header.max_size = max_size;
    }
}
