//! Buddy byte pool
//!
//! Serves byte payloads out of a single power-of-two region held by a
//! [`StorageBackend`]. Blocks are carved by halving larger free blocks and
//! merged back with their XOR buddy when freed.

use alloc::collections::BTreeMap;
use core::fmt;

use crate::{
    size_class_for, ByteStore, StorageBackend, StoreError, StoreResult, MAX_SIZE_CLASS,
};

#[cfg(feature = "log")]
use log::{debug, error, info, warn};

use super::{config::PoolConfig, free_list::FreeListTable, handle::MemHandle};

/// Binary buddy allocator over a growable byte region.
///
/// Free blocks live in a [`FreeListTable`]; allocated blocks are tracked by
/// offset so that stale or repeated frees are rejected instead of
/// corrupting the free lists.
pub struct BuddyPool<B> {
    pub(super) backend: B,
    pub(super) pool_size: usize,
    pub(super) max_pool_size: usize,
    pub(super) free_lists: FreeListTable,
    /// Live allocations keyed by offset
    pub(super) live: BTreeMap<usize, MemHandle>,
    pub(super) growths: usize,
}

impl<B: StorageBackend> BuddyPool<B> {
    /// Create a pool over `backend`, sized per `config`.
    ///
    /// The backend is resized to the initial pool size and the whole pool
    /// starts out as one free block.
    pub fn new(mut backend: B, config: PoolConfig) -> StoreResult<Self> {
        config.validate()?;
        if backend.capacity() != config.initial_size {
            backend.resize(config.initial_size)?;
        }

        debug!(
            "buddy pool: created with size {:#x}, max size {:#x}",
            config.initial_size, config.max_size
        );

        Ok(Self {
            backend,
            pool_size: config.initial_size,
            max_pool_size: config.max_size,
            free_lists: FreeListTable::with_whole_pool(config.initial_size),
            live: BTreeMap::new(),
            growths: 0,
        })
    }

    /// Create a pool of `initial_size` bytes with the default growth limit.
    pub fn with_initial_size(backend: B, initial_size: usize) -> StoreResult<Self> {
        Self::new(backend, PoolConfig::new(initial_size))
    }

    /// Store `payload` in the smallest block that can hold it.
    ///
    /// Grows the pool by doubling as many times as needed, up to the
    /// configured maximum.
    pub fn store_bytes(&mut self, payload: &[u8]) -> StoreResult<MemHandle> {
        let class = size_class_for(payload.len());
        if class > MAX_SIZE_CLASS || (1usize << class) > self.max_pool_size {
            error!(
                "buddy pool: payload of {} bytes can never fit in max pool size {:#x}",
                payload.len(),
                self.max_pool_size
            );
            return Err(StoreError::CapacityExceeded {
                requested: payload.len(),
                max_pool_size: self.max_pool_size,
            });
        }
        let block_size = 1usize << class;

        let offset = self.alloc_block(class, payload.len())?;

        if let Err(e) = self.backend.write_at(offset, payload) {
            error!(
                "buddy pool: backend write of {} bytes at {:#x} failed: {:?}",
                payload.len(),
                offset,
                e
            );
            self.free_lists.coalesce_and_insert(class, offset);
            return Err(e);
        }

        let handle = MemHandle::new(offset, block_size, payload.len());
        self.live.insert(offset, handle);
        Ok(handle)
    }

    /// Copy the payload behind `handle` into `out`.
    ///
    /// At most `min(out.len(), handle.data_size())` bytes are copied and the
    /// count is returned. Liveness of the handle is not checked; only that
    /// it lies inside the pool.
    pub fn get_bytes(&mut self, handle: &MemHandle, out: &mut [u8]) -> StoreResult<usize> {
        let in_pool = handle
            .offset()
            .checked_add(handle.block_size())
            .is_some_and(|end| end <= self.pool_size);
        if !in_pool || handle.data_size() > handle.block_size() {
            warn!(
                "buddy pool: read through handle {} outside pool of {:#x} bytes",
                handle, self.pool_size
            );
            return Err(StoreError::InvalidHandle);
        }

        let len = out.len().min(handle.data_size());
        self.backend.read_at(handle.offset(), &mut out[..len])?;
        Ok(len)
    }

    /// Return the block behind `handle` to the pool, merging it with free buddies.
    ///
    /// Fails with [`StoreError::InvalidHandle`] if `handle` is not exactly a
    /// live allocation of this pool; the free lists are left untouched.
    #[allow(unused_variables)]
    pub fn free_block(&mut self, handle: &MemHandle) -> StoreResult {
        match self.live.get(&handle.offset()) {
            Some(live) if live == handle => {}
            Some(live) => {
                warn!(
                    "buddy pool: free of {} does not match live allocation {}",
                    handle, live
                );
                return Err(StoreError::InvalidHandle);
            }
            None => {
                warn!(
                    "buddy pool: double free or stale handle {} (no live block at {:#x})",
                    handle,
                    handle.offset()
                );
                return Err(StoreError::InvalidHandle);
            }
        }

        self.live.remove(&handle.offset());
        let (class, offset) = self
            .free_lists
            .coalesce_and_insert(handle.size_class(), handle.offset());
        debug!(
            "buddy pool: freed {}, recorded free block {:#x} of {} bytes",
            handle,
            offset,
            1usize << class
        );
        Ok(())
    }

    /// Find or carve a free block of class `class`, growing the pool when needed.
    ///
    /// `requested` is the payload length, reported if the pool runs out.
    fn alloc_block(&mut self, class: usize, requested: usize) -> StoreResult<usize> {
        loop {
            if let Some(used_class) = self.free_lists.first_non_empty_from(class) {
                if let Some(offset) = self.free_lists.pop_lowest(used_class) {
                    self.split(offset, used_class, class);
                    return Ok(offset);
                }
            }

            if self.pool_size >= self.max_pool_size {
                error!(
                    "buddy pool: no free block of {} bytes and pool is at max size {:#x}",
                    1usize << class,
                    self.max_pool_size
                );
                #[cfg(feature = "tracking")]
                self.print_capacity_failure_stats(requested);
                return Err(StoreError::CapacityExceeded {
                    requested,
                    max_pool_size: self.max_pool_size,
                });
            }
            self.double_pool_size()?;
        }
    }

    /// Halve the block at `offset` from `from_class` down to `to_class`.
    ///
    /// Each upper half becomes free; the final lower half at `offset` is the
    /// allocation and is not recorded anywhere.
    fn split(&mut self, offset: usize, from_class: usize, to_class: usize) {
        let mut class = from_class;
        while class > to_class {
            class -= 1;
            let upper = offset + (1 << class);
            if !self.free_lists.insert(class, upper) {
                error!(
                    "buddy pool: failed to record split half {:#x} at class {}",
                    upper, class
                );
            }
        }
        if from_class > to_class {
            debug!(
                "buddy pool: split block {:#x} from {} to {} bytes",
                offset,
                1usize << from_class,
                1usize << to_class
            );
        }
    }

    /// Emit the free-list dump through the logger.
    pub fn log_free_lists(&self) {
        info!("========== Buddy Pool Free Lists ==========");
        info!("Pool size: {:#x} ({})", self.pool_size, self.pool_size);
        info!("Live allocations: {}", self.live.len());
        for class in 0..self.free_lists.num_classes() {
            let count = self.free_lists.len(class);
            if count > 0 {
                info!("  {} bytes: {} free blocks", 1usize << class, count);
            }
        }
        info!("===========================================");
    }
}

impl<B> BuddyPool<B> {
    /// Current pool size in bytes (always a power of two).
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Largest size the pool may grow to.
    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    /// Number of times the pool has doubled.
    pub fn growth_count(&self) -> usize {
        self.growths
    }

    /// The free-list table.
    pub fn free_lists(&self) -> &FreeListTable {
        &self.free_lists
    }

    /// Free blocks as `(block_size, offset)`, smallest size first, ascending offsets.
    pub fn free_blocks(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.free_lists
            .iter()
            .map(|(class, offset)| (1usize << class, offset))
    }

    /// Handles of all blocks currently allocated, ascending by offset.
    pub fn live_allocations(&self) -> impl Iterator<Item = &MemHandle> + '_ {
        self.live.values()
    }

    /// Bytes held by allocated blocks, padding included.
    pub fn used_bytes(&self) -> usize {
        self.live.values().map(MemHandle::block_size).sum()
    }

    /// Bytes held by free blocks.
    pub fn free_bytes(&self) -> usize {
        self.free_lists.free_bytes()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Consume the pool and hand back its backend.
    pub fn into_backend(self) -> B {
        self.backend
    }
}

impl<B: StorageBackend> ByteStore for BuddyPool<B> {
    fn store_bytes(&mut self, payload: &[u8]) -> StoreResult<MemHandle> {
        BuddyPool::store_bytes(self, payload)
    }

    fn get_bytes(&mut self, handle: &MemHandle, out: &mut [u8]) -> StoreResult<usize> {
        BuddyPool::get_bytes(self, handle, out)
    }

    fn free_block(&mut self, handle: &MemHandle) -> StoreResult {
        BuddyPool::free_block(self, handle)
    }

    fn pool_size(&self) -> usize {
        self.pool_size
    }
}

/// One line per non-empty size class: `<blockSize>: <offsets...>`.
impl<B> fmt::Display for BuddyPool<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.free_lists.is_empty() {
            return f.write_str("No free blocks are available.");
        }

        let mut first_line = true;
        for class in 0..self.free_lists.num_classes() {
            let mut offsets = self.free_lists.offsets(class);
            let Some(lowest) = offsets.next() else {
                continue;
            };
            if !first_line {
                f.write_str("\n")?;
            }
            first_line = false;
            write!(f, "{}: {}", 1usize << class, lowest)?;
            for offset in offsets {
                write!(f, " {}", offset)?;
            }
        }
        Ok(())
    }
}

impl<B> fmt::Debug for BuddyPool<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuddyPool")
            .field("pool_size", &self.pool_size)
            .field("max_pool_size", &self.max_pool_size)
            .field("free_lists", &self.free_lists)
            .field("live", &self.live.len())
            .field("growths", &self.growths)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VecBackend;
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;

    fn pool(size: usize) -> BuddyPool<VecBackend> {
        BuddyPool::with_initial_size(VecBackend::new(), size).unwrap()
    }

    fn free_set(pool: &BuddyPool<VecBackend>) -> Vec<(usize, usize)> {
        pool.free_blocks().collect()
    }

    #[test]
    fn test_new_pool_is_one_free_block() {
        let pool = pool(32);
        assert_eq!(pool.pool_size(), 32);
        assert_eq!(pool.backend().capacity(), 32);
        assert_eq!(free_set(&pool), vec![(32, 0)]);
        assert_eq!(pool.to_string(), "32: 0");
    }

    #[test]
    fn test_new_rejects_bad_config() {
        assert_eq!(
            BuddyPool::with_initial_size(VecBackend::new(), 48).unwrap_err(),
            StoreError::InvalidParam
        );
    }

    #[test]
    fn test_store_splits_down_to_class() {
        let mut pool = pool(32);
        let h = pool.store_bytes(&[1, 2]).unwrap();
        assert_eq!(h, MemHandle::new(0, 2, 2));
        assert_eq!(free_set(&pool), vec![(2, 2), (4, 4), (8, 8), (16, 16)]);

        let h2 = pool.store_bytes(&[3, 4]).unwrap();
        assert_eq!(h2, MemHandle::new(2, 2, 2));
        assert_eq!(free_set(&pool), vec![(4, 4), (8, 8), (16, 16)]);
    }

    #[test]
    fn test_empty_payload_takes_one_byte_block() {
        let mut pool = pool(8);
        let h = pool.store_bytes(&[]).unwrap();
        assert_eq!(h, MemHandle::new(0, 1, 0));
        let mut buf = [0xffu8; 4];
        assert_eq!(pool.get_bytes(&h, &mut buf).unwrap(), 0);
        assert_eq!(buf, [0xff; 4]);
    }

    #[test]
    fn test_get_bytes_truncates_to_shorter_side() {
        let mut pool = pool(64);
        let h = pool.store_bytes(b"hello world").unwrap();

        let mut short = [0u8; 5];
        assert_eq!(pool.get_bytes(&h, &mut short).unwrap(), 5);
        assert_eq!(&short, b"hello");

        let mut long = [0u8; 32];
        assert_eq!(pool.get_bytes(&h, &mut long).unwrap(), 11);
        assert_eq!(&long[..11], b"hello world");
        assert!(long[11..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_get_bytes_rejects_out_of_pool_handle() {
        let mut pool = pool(16);
        let mut buf = [0u8; 4];
        assert_eq!(
            pool.get_bytes(&MemHandle::new(16, 16, 4), &mut buf),
            Err(StoreError::InvalidHandle)
        );
    }

    #[test]
    fn test_free_merges_back_to_whole_pool() {
        let mut pool = pool(32);
        let a = pool.store_bytes(&[1, 2]).unwrap();
        let b = pool.store_bytes(&[3, 4]).unwrap();

        pool.free_block(&a).unwrap();
        assert_eq!(free_set(&pool), vec![(2, 0), (4, 4), (8, 8), (16, 16)]);

        pool.free_block(&b).unwrap();
        assert_eq!(free_set(&pool), vec![(32, 0)]);
        assert_eq!(pool.used_bytes(), 0);
    }

    #[test]
    fn test_double_free_is_rejected() {
        let mut pool = pool(32);
        let a = pool.store_bytes(&[1, 2]).unwrap();
        let _b = pool.store_bytes(&[3]).unwrap();
        pool.free_block(&a).unwrap();
        let before = pool.free_lists().clone();

        assert_eq!(pool.free_block(&a), Err(StoreError::InvalidHandle));
        assert_eq!(pool.free_lists(), &before);
    }

    #[test]
    fn test_mismatched_handle_is_rejected() {
        let mut pool = pool(32);
        let a = pool.store_bytes(&[1, 2, 3]).unwrap();
        let forged = MemHandle::new(a.offset(), 8, 3);
        assert_eq!(pool.free_block(&forged), Err(StoreError::InvalidHandle));
        assert_eq!(pool.live_allocations().count(), 1);
    }

    #[test]
    fn test_display_formats() {
        let mut pool = pool(32);
        let _a = pool.store_bytes(&[0; 2]).unwrap();
        let _b = pool.store_bytes(&[0; 2]).unwrap();
        let _c = pool.store_bytes(&[0; 2]).unwrap();
        assert_eq!(pool.to_string(), "2: 6\n8: 8\n16: 16");

        let mut full = BuddyPool::new(VecBackend::new(), PoolConfig::new(4).with_max_size(4))
            .unwrap();
        full.store_bytes(&[0; 4]).unwrap();
        assert_eq!(full.to_string(), "No free blocks are available.");
    }

    #[test]
    fn test_display_lists_multiple_offsets() {
        let mut pool = pool(16);
        let handles: Vec<_> = (0..4).map(|_| pool.store_bytes(&[0; 4]).unwrap()).collect();
        pool.free_block(&handles[0]).unwrap();
        pool.free_block(&handles[2]).unwrap();
        assert_eq!(pool.to_string(), "4: 0 8");
    }

    #[test]
    fn test_payload_larger_than_max_pool() {
        let mut pool = BuddyPool::new(VecBackend::new(), PoolConfig::new(16).with_max_size(64))
            .unwrap();
        assert_eq!(
            pool.store_bytes(&[0; 65]),
            Err(StoreError::CapacityExceeded {
                requested: 65,
                max_pool_size: 64
            })
        );
        assert_eq!(pool.pool_size(), 16);
        assert_eq!(pool.growth_count(), 0);
    }

    #[test]
    fn test_fragmented_pool_at_max_reports_capacity() {
        let mut pool = BuddyPool::new(VecBackend::new(), PoolConfig::new(16).with_max_size(16))
            .unwrap();
        let a = pool.store_bytes(&[0; 4]).unwrap();
        let _b = pool.store_bytes(&[0; 4]).unwrap();
        let _c = pool.store_bytes(&[0; 8]).unwrap();
        pool.free_block(&a).unwrap();

        assert_eq!(
            pool.store_bytes(&[0; 8]),
            Err(StoreError::CapacityExceeded {
                requested: 8,
                max_pool_size: 16
            })
        );
        assert_eq!(free_set(&pool), vec![(4, 0)]);
    }

    #[test]
    fn test_failed_write_returns_block() {
        use crate::buddy::test_support::FlakyBackend;

        let mut pool = BuddyPool::with_initial_size(FlakyBackend::default(), 32).unwrap();
        let kept = pool.store_bytes(&[5; 3]).unwrap();
        let before = pool.free_lists().clone();

        pool.backend.fail_writes = true;
        assert_eq!(pool.store_bytes(&[1, 2]), Err(StoreError::Io));
        assert_eq!(pool.free_lists(), &before);
        assert_eq!(pool.pool_size(), 32);
        assert_eq!(pool.growth_count(), 0);
        assert_eq!(pool.live_allocations().collect::<Vec<_>>(), vec![&kept]);
        assert_eq!(pool.check_invariants(), Ok(()));

        pool.free_block(&kept).unwrap();
        assert_eq!(pool.to_string(), "32: 0");
    }
}
