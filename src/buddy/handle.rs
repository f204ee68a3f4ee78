//! Memory handle
//!
//! The value handed back to callers for every stored payload. It carries the
//! block's offset and size class plus the caller's logical payload length.

use core::cmp::Ordering;
use core::fmt;

/// Location and extent of a stored payload.
///
/// Immutable once issued; two handles with the same three fields are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemHandle {
    offset: usize,
    block_size: usize,
    data_size: usize,
}

impl MemHandle {
    /// Create a handle. `block_size` must be a power of two no smaller than `data_size`.
    pub const fn new(offset: usize, block_size: usize, data_size: usize) -> Self {
        debug_assert!(block_size.is_power_of_two());
        debug_assert!(data_size <= block_size);
        Self {
            offset,
            block_size,
            data_size,
        }
    }

    /// Starting offset of the block within the pool.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Size of the allocated block (always a power of two).
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Logical payload length; the rest of the block is padding.
    pub const fn data_size(&self) -> usize {
        self.data_size
    }

    /// Size class of the block, i.e. `log2(block_size)`.
    pub const fn size_class(&self) -> usize {
        self.block_size.trailing_zeros() as usize
    }

    /// Offset of this block's buddy: the other half of the block twice its size.
    pub const fn buddy_offset(&self) -> usize {
        self.offset ^ self.block_size
    }

    /// One past the last byte of the block.
    pub const fn end(&self) -> usize {
        self.offset + self.block_size
    }
}

impl PartialOrd for MemHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MemHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.offset
            .cmp(&other.offset)
            .then(self.block_size.cmp(&other.block_size))
            .then(self.data_size.cmp(&other.data_size))
    }
}

impl fmt::Display for MemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{offset:{}, blockSize:{}, dataSize:{}}}",
            self.offset, self.block_size, self.data_size
        )
    }
}
