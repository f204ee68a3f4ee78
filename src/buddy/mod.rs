//! Buddy pool module
//!
//! This module provides the buddy system engine with:
//! - Sorted per-size-class free lists
//! - XOR buddy coalescing and pool doubling
//! - Invariant checking and optional statistics

pub mod buddy_pool;
pub mod config;
pub mod free_list;
pub mod growth;
pub mod handle;
pub mod invariants;
#[cfg(feature = "tracking")]
pub mod stats;

pub use buddy_pool::BuddyPool;
pub use config::PoolConfig;
pub use free_list::FreeListTable;
pub use handle::MemHandle;
pub use invariants::InvariantViolation;
#[cfg(feature = "tracking")]
pub use stats::PoolStats;

#[cfg(test)]
pub(crate) mod test_support;
