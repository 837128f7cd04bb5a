use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher};
use std::mem;
use std::sync::{Arc, Mutex};

use log::debug;

/// Extendible hash table: a directory of `2^global_depth` slots, each
/// referring to a bucket of at most `bucket_size` entries. A full bucket is
/// split instead of chained, doubling the directory when the bucket's local
/// depth catches up with the global depth.
///
/// Several directory slots may share one bucket; a bucket with local depth
/// `d` is referenced by exactly `2^(global_depth - d)` slots. The directory
/// only ever grows, entries are removed but buckets never merge.
///
/// The hasher is pluggable so the distribution can be pinned down where it
/// matters; the default matches [DefaultHasher].
pub struct ExtendibleHashTable<K, V, S = BuildHasherDefault<DefaultHasher>> {
    bucket_size: usize,
    hash_builder: S,
    directory: Mutex<Directory<K, V>>,
}

struct Directory<K, V> {
    global_depth: u32,
    slots: Vec<Arc<Bucket<K, V>>>,
    bucket_num: usize,
}

struct Bucket<K, V> {
    latch: Mutex<BucketState<K, V>>,
}

struct BucketState<K, V> {
    local_depth: u32,
    items: HashMap<K, V>,
}

impl<K: Hash + Eq, V: Clone> ExtendibleHashTable<K, V> {
    pub fn new(bucket_size: usize) -> ExtendibleHashTable<K, V> {
        ExtendibleHashTable::with_hasher(bucket_size, BuildHasherDefault::default())
    }
}

impl<K: Hash + Eq, V: Clone, S: BuildHasher> ExtendibleHashTable<K, V, S> {
    pub fn with_hasher(bucket_size: usize, hash_builder: S) -> ExtendibleHashTable<K, V, S> {
        ExtendibleHashTable {
            bucket_size,
            hash_builder,
            directory: Mutex::new(Directory {
                global_depth: 0,
                slots: vec![Arc::new(Bucket {
                    latch: Mutex::new(BucketState {
                        local_depth: 0,
                        items: HashMap::new(),
                    }),
                })],
                bucket_num: 1,
            }),
        }
    }

    /// Looks up the value stored under `key`.
    pub fn find(&self, key: &K) -> Option<V> {
        let bucket = self.bucket_for(key);
        let state = bucket.latch.lock().unwrap();
        state.items.get(key).cloned()
    }

    /// Removes the entry under `key` and returns whether one existed.
    /// The directory never shrinks.
    pub fn remove(&self, key: &K) -> bool {
        let bucket = self.bucket_for(key);
        let mut state = bucket.latch.lock().unwrap();
        state.items.remove(key).is_some()
    }

    /// Inserts `value` under `key`, overwriting any previous value. A full
    /// bucket is split, possibly repeatedly when every resident entry keeps
    /// landing on the same side.
    pub fn insert(&self, key: K, value: V) {
        loop {
            let bucket = self.bucket_for(&key);
            let mut state = bucket.latch.lock().unwrap();
            if state.items.contains_key(&key) || state.items.len() < self.bucket_size {
                state.items.insert(key, value);
                return;
            }
            self.split_bucket(&bucket, &mut state);
            // the key may now hash to either half, recompute the slot
        }
    }

    pub fn global_depth(&self) -> u32 {
        self.directory.lock().unwrap().global_depth
    }

    /// Local depth of the bucket referenced by `slot`, or [None] when the
    /// slot does not exist or its bucket holds no entries.
    pub fn local_depth(&self, slot: usize) -> Option<u32> {
        let bucket = {
            let directory = self.directory.lock().unwrap();
            Arc::clone(directory.slots.get(slot)?)
        };
        let state = bucket.latch.lock().unwrap();
        if state.items.is_empty() {
            None
        } else {
            Some(state.local_depth)
        }
    }

    pub fn num_buckets(&self) -> usize {
        self.directory.lock().unwrap().bucket_num
    }

    fn hash_key(&self, key: &K) -> u64 {
        let mut hasher = self.hash_builder.build_hasher();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn bucket_for(&self, key: &K) -> Arc<Bucket<K, V>> {
        let directory = self.directory.lock().unwrap();
        let mask = (1u64 << directory.global_depth) - 1;
        let slot = (self.hash_key(key) & mask) as usize;
        Arc::clone(&directory.slots[slot])
    }

    /// Splits a full bucket whose latch the caller holds. The directory lock
    /// is taken while the bucket latch is held; lookups take the two locks
    /// one after the other, never together, so the order cannot deadlock.
    fn split_bucket(&self, bucket: &Arc<Bucket<K, V>>, state: &mut BucketState<K, V>) {
        let mut directory = self.directory.lock().unwrap();
        let split_bit = 1u64 << state.local_depth;
        state.local_depth += 1;
        if state.local_depth > directory.global_depth {
            let mirror = directory.slots.clone();
            directory.slots.extend(mirror);
            directory.global_depth += 1;
            debug!("directory doubled to global depth {}", directory.global_depth);
        }

        let drained = mem::take(&mut state.items);
        let mut moved = HashMap::with_capacity(drained.len());
        for (key, value) in drained {
            if self.hash_key(&key) & split_bit != 0 {
                moved.insert(key, value);
            } else {
                state.items.insert(key, value);
            }
        }
        debug!(
            "bucket split at local depth {}: {} entries kept, {} moved",
            state.local_depth,
            state.items.len(),
            moved.len()
        );

        let sibling = Arc::new(Bucket {
            latch: Mutex::new(BucketState {
                local_depth: state.local_depth,
                items: moved,
            }),
        });
        directory.bucket_num += 1;
        for slot in 0..directory.slots.len() {
            if Arc::ptr_eq(&directory.slots[slot], bucket) && (slot as u64 & split_bit) != 0 {
                directory.slots[slot] = Arc::clone(&sibling);
            }
        }
    }
}
