//! Storage backends
//!
//! Byte-addressable stores the pool delegates payload bytes to.

pub mod memory;
#[cfg(feature = "std")]
pub mod paged;

pub use memory::VecBackend;
#[cfg(feature = "std")]
pub use paged::{CacheStats, PagedFileBackend};

/// Checks that `[offset, offset + len)` lies within `capacity`.
#[inline]
pub(crate) fn range_in_bounds(offset: usize, len: usize, capacity: usize) -> bool {
    offset.checked_add(len).is_some_and(|end| end <= capacity)
}
