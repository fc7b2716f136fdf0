//! Fanring - Lock-free broadcast ring buffer
//!
//! - `RingBuffer<T>` - fixed-capacity shared core (slots + consumer registry)
//! - `Producer<T>` - unique write handle, spins against the slowest consumer
//! - `Consumer<T>` - per-subscriber read handle, sees every value in order
//!
//! One thread writes, any number of threads (up to a fixed limit) read, and
//! every consumer observes every value produced after it joined, in
//! production order. No mutex anywhere: registration, removal and admission
//! all coordinate through compare-and-swap and wrapping position counters.
//!
//! ```
//! let (mut producer, ring) = fanring::RingBuffer::create(8, 2)?;
//! let mut consumer = ring.create_consumer()?;
//!
//! producer.write(7u64);
//! assert_eq!(consumer.get(), 7);
//! # Ok::<(), fanring::RingError>(())
//! ```

// Tracing macros - no-op when feature disabled
#[cfg(feature = "tracing")]
macro_rules! trace_debug { ($($arg:tt)*) => { tracing::debug!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug { ($($arg:tt)*) => {} }

pub mod error;
pub mod ring;

// Re-export main components
pub use error::{Result, RingError};
pub use ring::{Consumer, Producer, RingBuffer, RingConfig, Sequence};
