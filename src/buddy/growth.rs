//! Pool growth
//!
//! Doubles the pool when no free block is large enough. Existing offsets stay
//! valid: the backend keeps its prefix and every free-list entry carries over.

use crate::{StorageBackend, StoreError, StoreResult};

#[cfg(feature = "log")]
use log::{debug, error};

use super::buddy_pool::BuddyPool;

impl<B: StorageBackend> BuddyPool<B> {
    /// Double the pool from `P` to `2P`.
    ///
    /// The new upper half `[P, 2P)` enters the free lists through the normal
    /// coalescing path, so if the old pool was entirely free the two halves
    /// merge into a single `2P` block. The new table is only installed once
    /// the backend has grown; on backend failure nothing changes.
    #[allow(unused_variables)]
    pub fn double_pool_size(&mut self) -> StoreResult {
        let old_size = self.pool_size;
        let new_size = match old_size.checked_mul(2) {
            Some(size) if size <= self.max_pool_size => size,
            _ => {
                error!(
                    "buddy pool: cannot grow past max pool size {:#x} (current {:#x})",
                    self.max_pool_size, old_size
                );
                return Err(StoreError::CapacityExceeded {
                    requested: old_size.saturating_mul(2),
                    max_pool_size: self.max_pool_size,
                });
            }
        };

        let mut free_lists = self.free_lists.grown();
        let old_top = free_lists.top_class() - 1;
        let (class, offset) = free_lists.coalesce_and_insert(old_top, old_size);

        self.backend.resize(new_size)?;

        self.free_lists = free_lists;
        self.pool_size = new_size;
        self.growths += 1;

        debug!(
            "buddy pool: grew from {:#x} to {:#x}, new free block {:#x} of {} bytes",
            old_size,
            new_size,
            offset,
            1usize << class
        );
        Ok(())
    }
}
