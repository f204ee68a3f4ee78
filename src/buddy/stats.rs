//! Statistics and debugging for the buddy pool
//!
//! Provides on-demand statistics and capacity failure reporting.

#[cfg(feature = "log")]
use log::error;

use crate::MAX_SIZE_CLASS;

use super::buddy_pool::BuddyPool;

/// Buddy pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub pool_size: usize,
    pub free_bytes: usize,
    pub used_bytes: usize,
    pub live_blocks: usize,
    /// Sum of the callers' payload lengths (excludes block padding)
    pub payload_bytes: usize,
    pub growths: usize,
    pub free_blocks_by_class: [usize; MAX_SIZE_CLASS + 1],
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolStats {
    pub const fn new() -> Self {
        Self {
            pool_size: 0,
            free_bytes: 0,
            used_bytes: 0,
            live_blocks: 0,
            payload_bytes: 0,
            growths: 0,
            free_blocks_by_class: [0; MAX_SIZE_CLASS + 1],
        }
    }

    /// Size of the largest free block, or 0 when nothing is free.
    pub fn largest_free_block(&self) -> usize {
        self.free_blocks_by_class
            .iter()
            .rposition(|&count| count > 0)
            .map_or(0, |class| 1 << class)
    }

    /// Fraction of free bytes that lie outside the largest free block.
    ///
    /// 0.0 means all free memory is one block (or nothing is free).
    pub fn fragmentation(&self) -> f64 {
        if self.free_bytes == 0 {
            return 0.0;
        }
        1.0 - self.largest_free_block() as f64 / self.free_bytes as f64
    }

    /// Bytes lost to rounding payloads up to a power of two.
    pub fn padding_bytes(&self) -> usize {
        self.used_bytes - self.payload_bytes
    }
}

impl<B> BuddyPool<B> {
    /// Snapshot of the pool's current occupancy.
    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats::new();
        stats.pool_size = self.pool_size;
        stats.growths = self.growths;

        for class in 0..self.free_lists.num_classes() {
            let count = self.free_lists.len(class);
            stats.free_blocks_by_class[class] = count;
            stats.free_bytes += count << class;
        }

        for handle in self.live.values() {
            stats.live_blocks += 1;
            stats.used_bytes += handle.block_size();
            stats.payload_bytes += handle.data_size();
        }
        stats
    }

    /// Print detailed statistics after a failed allocation of `requested` bytes.
    #[allow(unused_variables)]
    pub fn print_capacity_failure_stats(&self, requested: usize) {
        let stats = self.stats();
        error!("========================================");
        error!(
            "Request: {} bytes (max pool size {:#x})",
            requested, self.max_pool_size
        );
        error!("Pool State:");
        error!("  Pool size: {:#x} ({} growths)", stats.pool_size, stats.growths);
        error!("  Free bytes: {}", stats.free_bytes);
        error!(
            "  Used bytes: {} in {} blocks ({} padding)",
            stats.used_bytes,
            stats.live_blocks,
            stats.padding_bytes()
        );
        error!("  Free blocks by size:");
        for class in (0..=MAX_SIZE_CLASS).rev() {
            let count = stats.free_blocks_by_class[class];
            if count > 0 {
                error!("    {} bytes: {} blocks", 1usize << class, count);
            }
        }
        error!("========================================");
    }
}
