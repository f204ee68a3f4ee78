//! Pool configuration

use crate::{StoreError, StoreResult, DEFAULT_INITIAL_POOL_SIZE, DEFAULT_MAX_POOL_SIZE};

/// Sizing parameters for a [`BuddyPool`](super::BuddyPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Pool size at construction. Must be a power of two.
    pub initial_size: usize,
    /// Largest size the pool may double up to. Must be a power of two.
    pub max_size: usize,
}

impl PoolConfig {
    pub const fn new(initial_size: usize) -> Self {
        Self {
            initial_size,
            max_size: DEFAULT_MAX_POOL_SIZE,
        }
    }

    pub const fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Check that both sizes are powers of two and `initial_size <= max_size`.
    pub fn validate(&self) -> StoreResult {
        if !self.initial_size.is_power_of_two()
            || !self.max_size.is_power_of_two()
            || self.initial_size > self.max_size
        {
            return Err(StoreError::InvalidParam);
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_POOL_SIZE)
    }
}
