//! Backend doubles for exercising the pool's failure paths.

use crate::{StorageBackend, StoreError, StoreResult, VecBackend};

/// In-memory backend whose writes and resizes can be switched to fail.
#[derive(Debug, Default)]
pub(crate) struct FlakyBackend {
    pub inner: VecBackend,
    pub fail_writes: bool,
    pub fail_resize: bool,
}

impl StorageBackend for FlakyBackend {
    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> StoreResult {
        self.inner.read_at(offset, buf)
    }

    fn write_at(&mut self, offset: usize, data: &[u8]) -> StoreResult {
        if self.fail_writes {
            return Err(StoreError::Io);
        }
        self.inner.write_at(offset, data)
    }

    fn resize(&mut self, new_capacity: usize) -> StoreResult {
        if self.fail_resize {
            return Err(StoreError::Io);
        }
        self.inner.resize(new_capacity)
    }
}
