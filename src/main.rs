use std::sync::{Arc, Mutex};

use log::info;
use rand::Rng;

use pagestore::b_plus_tree::b_plus_tree_internal_page::InternalPage;
use pagestore::common::generic_key::GenericKey;
use pagestore::disk_management::buffer_pool::BufferPool;
use pagestore::disk_management::disk_manager::{DiskManager, INVALID_PAGE_ID};
use pagestore::extendible_hashing::extendible_hash_table::ExtendibleHashTable;

fn main() -> std::io::Result<()> {
    env_logger::init();

    let table = ExtendibleHashTable::<u32, u32>::new(64);
    let mut rng = rand::thread_rng();
    for _ in 0..10_000 {
        table.insert(rng.gen(), rng.gen());
    }
    info!(
        "hash table grew to global depth {} across {} buckets",
        table.global_depth(),
        table.num_buckets()
    );

    let db_path = std::env::temp_dir().join("pagestore_demo.db");
    let disk_manager = Arc::new(Mutex::new(DiskManager::new(&db_path)?));
    let buffer_pool = BufferPool::new(16, disk_manager);

    let root_page = buffer_pool
        .new_page()?
        .expect("a fresh pool always has a free frame");
    let left_page = buffer_pool.new_page()?.expect("free frame");
    let right_page = buffer_pool.new_page()?.expect("free frame");

    InternalPage::<GenericKey<8>>::new(left_page.page_id(), root_page.page_id())
        .write_to(&left_page);
    InternalPage::<GenericKey<8>>::new(right_page.page_id(), root_page.page_id())
        .write_to(&right_page);
    let mut root = InternalPage::<GenericKey<8>>::new(root_page.page_id(), INVALID_PAGE_ID);
    root.populate_new_root(
        left_page.page_id(),
        GenericKey::from_u64(42),
        right_page.page_id(),
    );
    root.write_to(&root_page);
    info!(
        "seeded a two-child root at page {}, key 42 separates pages {} and {}",
        root_page.page_id(),
        left_page.page_id(),
        right_page.page_id()
    );

    for page in [left_page, right_page, root_page] {
        buffer_pool.unpin_page(page.page_id(), true);
    }
    buffer_pool.flush_all_pages()?;
    std::fs::remove_file(&db_path)?;
    Ok(())
}
