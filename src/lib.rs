//! Buddy byte pool
//!
//! A growable binary buddy allocator that serves variable-size byte payloads
//! out of a single power-of-two region, featuring:
//! - Per-size-class sorted free lists with XOR buddy coalescing
//! - Pool doubling when no block is large enough
//! - Pluggable storage backends (in-memory, or file-backed with an LRU page cache)
//! - An optional spin-locked wrapper for shared use

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// Pool size used when no explicit configuration is given.
pub const DEFAULT_INITIAL_POOL_SIZE: usize = 32;

/// Upper bound on pool growth when no explicit configuration is given (1 GiB).
pub const DEFAULT_MAX_POOL_SIZE: usize = 1 << 30;

/// Highest size class any pool can describe.
pub const MAX_SIZE_CLASS: usize = usize::BITS as usize - 1;

/// The error type used by the pool and its backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Invalid configuration (e.g. a pool size that is not a power of two).
    #[error("invalid parameter")]
    InvalidParam,
    /// The payload needs a block larger than the pool may ever grow to.
    #[error("requested block of {requested} bytes exceeds maximum pool size {max_pool_size}")]
    CapacityExceeded {
        requested: usize,
        max_pool_size: usize,
    },
    /// The handle does not describe a block this pool currently has allocated.
    #[error("handle does not refer to a live allocation")]
    InvalidHandle,
    /// A backend access went past the backend's capacity.
    #[error("backend access out of range")]
    OutOfRange,
    /// The backend failed to perform I/O.
    #[error("backend I/O failure")]
    Io,
}

/// A [`Result`] type with [`StoreError`] as the error type.
pub type StoreResult<T = ()> = Result<T, StoreError>;

/// Byte-range storage the pool writes payloads into.
///
/// The backend is addressable over `[0, capacity())`. The pool only ever
/// grows it, and growth must keep the existing prefix intact.
pub trait StorageBackend {
    /// Returns the number of addressable bytes.
    fn capacity(&self) -> usize;

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> StoreResult;

    /// Copy `data` into the backend starting at `offset`.
    fn write_at(&mut self, offset: usize, data: &[u8]) -> StoreResult;

    /// Grow (or shrink) the addressable range to `new_capacity` bytes.
    fn resize(&mut self, new_capacity: usize) -> StoreResult;

    /// Push any buffered writes down to durable storage.
    fn flush(&mut self) -> StoreResult {
        Ok(())
    }
}

/// Byte-payload store interface exposed to callers.
pub trait ByteStore {
    /// Store `payload` and return a handle describing where it lives.
    fn store_bytes(&mut self, payload: &[u8]) -> StoreResult<MemHandle>;

    /// Copy up to `out.len()` bytes of the payload behind `handle` into `out`.
    ///
    /// Returns the number of bytes copied.
    fn get_bytes(&mut self, handle: &MemHandle, out: &mut [u8]) -> StoreResult<usize>;

    /// Release the block behind `handle`.
    fn free_block(&mut self, handle: &MemHandle) -> StoreResult;

    /// Returns the current pool size in bytes.
    fn pool_size(&self) -> usize;
}

/// Returns the size class (log2 of the block size) able to hold `len` bytes.
#[inline]
pub const fn size_class_for(len: usize) -> usize {
    if len <= 1 {
        0
    } else {
        (usize::BITS - (len - 1).leading_zeros()) as usize
    }
}

/// Checks whether the offset has the demanded alignment.
///
/// Equivalent to `offset % align == 0`, but the alignment must be a power of two.
#[inline]
const fn is_aligned(offset: usize, align: usize) -> bool {
    offset & (align - 1) == 0
}

pub mod backend;
pub use backend::VecBackend;
#[cfg(feature = "std")]
pub use backend::{CacheStats, PagedFileBackend};

pub mod buddy;
#[cfg(feature = "tracking")]
pub use buddy::PoolStats;
pub use buddy::{BuddyPool, FreeListTable, InvariantViolation, MemHandle, PoolConfig};

pub mod locked;
pub use locked::LockedBuddyPool;
