//! Spin-locked pool wrapper.
//!
//! The pool's split and merge paths update several free lists per call, so
//! the lock covers the whole pool instance rather than individual lists.

use kspin::{SpinNoIrq, SpinNoIrqGuard};

use crate::{BuddyPool, ByteStore, MemHandle, PoolConfig, StorageBackend, StoreResult};

/// A [`BuddyPool`] behind a spin lock, usable through a shared reference.
pub struct LockedBuddyPool<B> {
    inner: SpinNoIrq<BuddyPool<B>>,
}

impl<B: StorageBackend> LockedBuddyPool<B> {
    pub fn new(backend: B, config: PoolConfig) -> StoreResult<Self> {
        Ok(Self::from_pool(BuddyPool::new(backend, config)?))
    }

    pub const fn from_pool(pool: BuddyPool<B>) -> Self {
        Self {
            inner: SpinNoIrq::new(pool),
        }
    }

    /// Lock the pool for a multi-step sequence of operations.
    pub fn lock(&self) -> SpinNoIrqGuard<'_, BuddyPool<B>> {
        self.inner.lock()
    }

    pub fn store_bytes(&self, payload: &[u8]) -> StoreResult<MemHandle> {
        self.inner.lock().store_bytes(payload)
    }

    pub fn get_bytes(&self, handle: &MemHandle, out: &mut [u8]) -> StoreResult<usize> {
        self.inner.lock().get_bytes(handle, out)
    }

    pub fn free_block(&self, handle: &MemHandle) -> StoreResult {
        self.inner.lock().free_block(handle)
    }

    pub fn pool_size(&self) -> usize {
        self.inner.lock().pool_size()
    }

    pub fn into_inner(self) -> BuddyPool<B> {
        self.inner.into_inner()
    }
}

impl<B: StorageBackend> ByteStore for LockedBuddyPool<B> {
    fn store_bytes(&mut self, payload: &[u8]) -> StoreResult<MemHandle> {
        self.inner.get_mut().store_bytes(payload)
    }

    fn get_bytes(&mut self, handle: &MemHandle, out: &mut [u8]) -> StoreResult<usize> {
        self.inner.get_mut().get_bytes(handle, out)
    }

    fn free_block(&mut self, handle: &MemHandle) -> StoreResult {
        self.inner.get_mut().free_block(handle)
    }

    fn pool_size(&self) -> usize {
        LockedBuddyPool::pool_size(self)
    }
}
