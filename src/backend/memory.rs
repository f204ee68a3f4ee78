//! In-memory backend

use alloc::vec::Vec;

#[cfg(feature = "log")]
use log::warn;

use super::range_in_bounds;
use crate::{StorageBackend, StoreError, StoreResult};

/// Plain heap buffer backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VecBackend {
    bytes: Vec<u8>,
}

impl VecBackend {
    /// Create an empty backend; the pool sizes it on construction.
    pub const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Create a zero-filled backend of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut bytes = Vec::new();
        bytes.resize(capacity, 0);
        Self { bytes }
    }

    /// The raw contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl StorageBackend for VecBackend {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> StoreResult {
        if !range_in_bounds(offset, buf.len(), self.bytes.len()) {
            warn!(
                "vec backend: read [{:#x}, +{:#x}) past capacity {:#x}",
                offset,
                buf.len(),
                self.bytes.len()
            );
            return Err(StoreError::OutOfRange);
        }
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_at(&mut self, offset: usize, data: &[u8]) -> StoreResult {
        if !range_in_bounds(offset, data.len(), self.bytes.len()) {
            warn!(
                "vec backend: write [{:#x}, +{:#x}) past capacity {:#x}",
                offset,
                data.len(),
                self.bytes.len()
            );
            return Err(StoreError::OutOfRange);
        }
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn resize(&mut self, new_capacity: usize) -> StoreResult {
        self.bytes.resize(new_capacity, 0);
        Ok(())
    }
}
