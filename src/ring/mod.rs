//! Lock-free broadcast ring buffer (single producer, fan-out consumers).
//!
//! - `RingBuffer<T>` - shared core: payload slots + consumer registry
//! - `Producer<T>` - unique write handle
//! - `Consumer<T>` - independent read handle, joinable/leavable at runtime

mod broadcast;
mod index;
mod registry;
mod storage;

// Re-exports
pub use broadcast::{Consumer, Producer, RingBuffer};

use crate::error::{Result, RingError};

/// Default ring capacity (must be a power of 2)
const DEFAULT_CAPACITY: usize = 1024;

/// Default consumer slot table size
const DEFAULT_MAX_CONSUMERS: usize = 8;

/// Largest supported capacity. Lag comparisons are wrapping 32-bit
/// distances and stay unambiguous only while every lag fits in 2^31.
const MAX_CAPACITY: usize = 1 << 31;

/// Position counter type for ring positions. Wraps after 2^32 operations
/// by design; compare counters by distance, never by raw ordering.
pub type Sequence = u32;

/// Configuration for ring buffer behavior
#[derive(Debug, Clone)]
pub struct RingConfig {
    /// Number of payload slots (power of 2)
    pub capacity: usize,
    /// Size of the consumer slot table
    pub max_consumers: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_consumers: DEFAULT_MAX_CONSUMERS,
        }
    }
}

impl RingConfig {
    /// Create a new configuration with the specified capacity
    pub fn new(capacity: usize) -> Result<Self> {
        if !capacity.is_power_of_two() || capacity > MAX_CAPACITY {
            return Err(RingError::InvalidCapacity(capacity));
        }

        Ok(Self {
            capacity,
            ..Default::default()
        })
    }

    /// Set the consumer limit. Slots are claimed and released at runtime,
    /// so provision generously before steady-state operation rather than
    /// sizing for the expected minimum.
    pub fn with_max_consumers(mut self, max_consumers: usize) -> Result<Self> {
        if max_consumers == 0 {
            return Err(RingError::InvalidConsumerLimit(max_consumers));
        }

        self.max_consumers = max_consumers;
        Ok(self)
    }
}
