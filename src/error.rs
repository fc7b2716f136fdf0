//! Error types for fanring.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RingError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RingError {
    /// Ring capacity must be a power of two no larger than 2^31. Slot
    /// lookup is a bitmask and lag comparisons are modular distances, so
    /// neither survives an arbitrary capacity.
    #[error("invalid ring capacity {0}: must be a power of two in 1..=2^31")]
    InvalidCapacity(usize),

    /// The consumer slot table needs room for at least one consumer.
    #[error("invalid consumer limit {0}: must be at least 1")]
    InvalidConsumerLimit(usize),

    /// Every slot in the consumer table is active. Recoverable: retry
    /// after a consumer is removed, or provision a larger limit up front.
    #[error("all {limit} consumer slots are active")]
    MaxConsumersReached { limit: usize },
}
