//! Buddy pool over the file-backed page cache

#![cfg(feature = "std")]

use buddy_byte_pool::{BuddyPool, PagedFileBackend, PoolConfig, StorageBackend};

#[test]
fn test_pool_over_paged_file() {
    let path = std::env::temp_dir().join(format!(
        "buddy-byte-pool-integration-{}.bin",
        std::process::id()
    ));
    let backend = PagedFileBackend::create(&path, 16, 2).unwrap();
    let mut pool = BuddyPool::new(backend, PoolConfig::new(32)).unwrap();

    let small = pool.store_bytes(b"first").unwrap();
    let large: Vec<u8> = (0..100u8).collect();
    let big = pool.store_bytes(&large).unwrap();
    assert_eq!(pool.pool_size(), 256);
    assert_eq!(pool.backend().capacity(), 256);

    let mut out = vec![0u8; 100];
    pool.get_bytes(&big, &mut out).unwrap();
    assert_eq!(out, large);
    let mut out = [0u8; 5];
    pool.get_bytes(&small, &mut out).unwrap();
    assert_eq!(&out, b"first");
    assert!(pool.backend().cache_stats().evictions > 0);

    pool.free_block(&small).unwrap();
    let mut backend = pool.into_backend();
    backend.flush().unwrap();
    drop(backend);

    let contents = std::fs::read(&path).unwrap();
    assert_eq!(contents.len(), 256);
    assert_eq!(&contents[big.offset()..big.offset() + 100], large.as_slice());
    std::fs::remove_file(&path).unwrap();
}
