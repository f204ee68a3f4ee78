//! Structural checks over the pool's bookkeeping.

use alloc::vec::Vec;

use super::buddy_pool::BuddyPool;

/// A broken bookkeeping invariant found by [`BuddyPool::check_invariants`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("pool size {0:#x} is not a power of two")]
    PoolSizeNotPowerOfTwo(usize),
    #[error("pool of {pool_size:#x} bytes tracks {classes} size classes")]
    ClassCountMismatch { pool_size: usize, classes: usize },
    #[error("block {offset:#x} is not aligned to its size {block_size}")]
    Misaligned { block_size: usize, offset: usize },
    #[error("free block {offset:#x} and its buddy of size {block_size} are both free")]
    FreeBuddies { block_size: usize, offset: usize },
    #[error("blocks overlap at {offset:#x}")]
    Overlap { offset: usize },
    #[error("bytes from {offset:#x} are neither free nor allocated")]
    Gap { offset: usize },
}

impl<B> BuddyPool<B> {
    /// Verify the pool's bookkeeping.
    ///
    /// Checks that the pool size is a power of two matching the free-list
    /// table, that every block is aligned to its size, that no two free
    /// buddies coexist, and that free and live blocks tile `[0, pool_size)`
    /// exactly.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if !self.pool_size.is_power_of_two() {
            return Err(InvariantViolation::PoolSizeNotPowerOfTwo(self.pool_size));
        }
        if self.free_lists.num_classes() != self.pool_size.trailing_zeros() as usize + 1 {
            return Err(InvariantViolation::ClassCountMismatch {
                pool_size: self.pool_size,
                classes: self.free_lists.num_classes(),
            });
        }

        let mut blocks: Vec<(usize, usize)> = Vec::with_capacity(self.live.len());
        for (block_size, offset) in self.free_blocks() {
            if block_size < self.pool_size && self.free_lists.contains(
                block_size.trailing_zeros() as usize,
                offset ^ block_size,
            ) {
                return Err(InvariantViolation::FreeBuddies { block_size, offset });
            }
            blocks.push((offset, block_size));
        }
        blocks.extend(self.live.values().map(|h| (h.offset(), h.block_size())));
        blocks.sort_unstable();

        let mut cursor = 0;
        for (offset, block_size) in blocks {
            if offset & (block_size - 1) != 0 {
                return Err(InvariantViolation::Misaligned { block_size, offset });
            }
            if offset < cursor {
                return Err(InvariantViolation::Overlap { offset });
            }
            if offset > cursor {
                return Err(InvariantViolation::Gap { offset: cursor });
            }
            cursor = offset + block_size;
        }
        if cursor > self.pool_size {
            return Err(InvariantViolation::Overlap {
                offset: self.pool_size,
            });
        }
        if cursor < self.pool_size {
            return Err(InvariantViolation::Gap { offset: cursor });
        }
        Ok(())
    }
}
