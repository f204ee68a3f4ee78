//! Randomized store/free workload checked against the pool invariants
//!
//! Uses a fixed-seed xorshift generator so every run replays the same
//! sequence of operations.

#![no_std]

extern crate alloc;
extern crate buddy_byte_pool;

use alloc::vec::Vec;
use buddy_byte_pool::{BuddyPool, MemHandle, PoolConfig, StoreError, VecBackend};

struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

fn payload_for(seed: usize, len: usize) -> Vec<u8> {
    (0..len).map(|i| (seed * 31 + i * 17) as u8).collect()
}

fn assert_no_free_buddies(pool: &BuddyPool<VecBackend>) {
    let blocks: Vec<(usize, usize)> = pool.free_blocks().collect();
    for &(size, offset) in &blocks {
        assert_eq!(offset % size, 0, "free block {:#x} misaligned", offset);
        if size < pool.pool_size() {
            assert!(
                !blocks.contains(&(size, offset ^ size)),
                "free block {:#x} and its buddy are both free",
                offset
            );
        }
    }
}

#[test]
fn test_random_workload_keeps_invariants() {
    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);
    let mut pool =
        BuddyPool::new(VecBackend::new(), PoolConfig::new(32).with_max_size(1 << 20)).unwrap();
    let mut live: Vec<(MemHandle, usize)> = Vec::new();

    for step in 0..2000 {
        if live.is_empty() || rng.below(100) < 55 {
            let len = rng.below(200);
            let handle = pool.store_bytes(&payload_for(step, len)).unwrap();
            live.push((handle, step));
        } else {
            let (handle, _) = live.swap_remove(rng.below(live.len()));
            pool.free_block(&handle).unwrap();
            assert_eq!(pool.free_block(&handle), Err(StoreError::InvalidHandle));
        }

        assert_eq!(pool.check_invariants(), Ok(()), "step {}", step);
        assert_no_free_buddies(&pool);
        assert!(pool.pool_size().is_power_of_two());
        assert_eq!(pool.used_bytes() + pool.free_bytes(), pool.pool_size());
    }

    for (handle, seed) in &live {
        let mut out = alloc::vec![0u8; handle.data_size()];
        assert_eq!(pool.get_bytes(handle, &mut out).unwrap(), handle.data_size());
        assert_eq!(out, payload_for(*seed, handle.data_size()));
    }

    for (handle, _) in live.drain(..) {
        pool.free_block(&handle).unwrap();
    }
    assert_eq!(
        pool.free_blocks().collect::<Vec<_>>(),
        alloc::vec![(pool.pool_size(), 0)]
    );
}

#[test]
fn test_growth_preserves_existing_payloads() {
    let mut pool = BuddyPool::with_initial_size(VecBackend::new(), 8).unwrap();
    let mut stored = Vec::new();
    for i in 0..40 {
        let payload = payload_for(i, i % 13 + 1);
        stored.push((pool.store_bytes(&payload).unwrap(), payload));
    }
    assert!(pool.growth_count() > 0);
    assert_eq!(pool.check_invariants(), Ok(()));

    for (handle, payload) in &stored {
        let mut out = alloc::vec![0u8; payload.len()];
        pool.get_bytes(handle, &mut out).unwrap();
        assert_eq!(&out, payload);
    }
}
