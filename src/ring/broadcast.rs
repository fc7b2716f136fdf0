//! Broadcast ring: admission-controlled writes, per-consumer cursors.
//!
//! The producer spins against the slowest active consumer instead of
//! taking a lock; consumers spin against the write counter. Both spins
//! yield the processor on every failed attempt and have no other exit
//! condition, so a permanently stalled peer stalls the spinner too. That
//! liveness hazard is the caller's to manage (remove stalled consumers),
//! never detected internally.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use crate::error::Result;

use super::index::distance;
use super::registry::ConsumerRegistry;
use super::storage::SlotStorage;
use super::{RingConfig, Sequence};

/// Shared core of a broadcast ring. Construct through [`RingBuffer::create`]
/// or [`RingBuffer::with_config`], which hand back the unique write handle
/// alongside the shared reference used to register consumers.
pub struct RingBuffer<T> {
    storage: SlotStorage<T>,
    registry: ConsumerRegistry,
    /// Total writes ever issued; equivalently, the next position to write.
    write_counter: AtomicU32,
    capacity: Sequence,
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Default> RingBuffer<T> {
    /// Build a ring from a validated configuration.
    pub fn with_config(config: RingConfig) -> (Producer<T>, Arc<RingBuffer<T>>) {
        let ring = Arc::new(RingBuffer {
            storage: SlotStorage::new(config.capacity),
            registry: ConsumerRegistry::new(config.max_consumers),
            write_counter: AtomicU32::new(0),
            capacity: config.capacity as Sequence,
        });

        (Producer { ring: ring.clone() }, ring)
    }

    /// Convenience constructor; validates `capacity` (power of two) and
    /// `max_consumers` (at least one).
    pub fn create(capacity: usize, max_consumers: usize) -> Result<(Producer<T>, Arc<RingBuffer<T>>)> {
        let config = RingConfig::new(capacity)?.with_max_consumers(max_consumers)?;
        Ok(Self::with_config(config))
    }

    /// Register a consumer starting at the current write position. Values
    /// written before this call are never delivered to the new handle.
    ///
    /// Fails with `MaxConsumersReached` when every table slot is active;
    /// a slot freed by [`Consumer::remove`] (or a drop) is immediately
    /// claimable again.
    pub fn create_consumer(self: &Arc<Self>) -> Result<Consumer<T>> {
        let position = self.write_counter.load(Ordering::Acquire);
        let slot_id = self.registry.claim(position)?;

        Ok(Consumer {
            slot_id,
            ring: self.clone(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn max_consumers(&self) -> usize {
        self.registry.limit()
    }

    /// Currently active consumers. Approximate while claims/releases are
    /// in flight; meant for diagnostics and tests.
    pub fn consumer_count(&self) -> usize {
        self.registry.active_count()
    }

    #[inline(always)]
    fn is_published(&self, position: Sequence) -> bool {
        distance(self.write_counter.load(Ordering::Acquire), position) != 0
    }
}

/// The ring's unique write handle.
///
/// Not cloneable, and `write` takes `&mut self`: the single-producer
/// precondition the algorithm relies on is structural instead of a
/// documented hazard. Move the handle to whichever thread produces.
pub struct Producer<T> {
    ring: Arc<RingBuffer<T>>,
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").finish_non_exhaustive()
    }
}

impl<T: Clone + Default> Producer<T> {
    /// Blocking write.
    ///
    /// Spins (cooperative yield per attempt) until the slowest active
    /// consumer is within `capacity` positions, then stores the value and
    /// publishes it by advancing the write counter. With no consumers
    /// registered there is no lower bound and the write lands
    /// immediately: no listener, no backpressure.
    pub fn write(&mut self, value: T) {
        let ring = &*self.ring;
        let current = ring.write_counter.load(Ordering::Relaxed);
        let mut spun = false;

        loop {
            let clear = match ring.registry.max_lag(current) {
                None => true,
                Some(lag) => lag < ring.capacity,
            };

            if clear {
                // Safety: `&mut self` on the unique handle makes this the
                // only store path, and the admission check above keeps
                // every consumer's cursor off this slot.
                unsafe { ring.storage.store(current, value) };
                ring.write_counter
                    .store(current.wrapping_add(1), Ordering::Release);
                return;
            }

            if !spun {
                spun = true;
                trace_debug!("write {current} backpressured by slowest consumer");
            }
            thread::yield_now();
        }
    }

    /// Shared reference to the ring, for registering consumers from the
    /// producer side.
    pub fn ring(&self) -> &Arc<RingBuffer<T>> {
        &self.ring
    }
}

/// Read handle for one registered consumer.
///
/// `get` takes `&mut self`, so exactly one thread drives a handle at a
/// time; the handle itself is `Send` and can be moved between threads
/// between calls. Dropping the handle releases its slot.
pub struct Consumer<T> {
    slot_id: usize,
    ring: Arc<RingBuffer<T>>,
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("slot_id", &self.slot_id)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Default> Consumer<T> {
    /// Blocking read of the next position, in production order.
    ///
    /// The position is reserved before availability is checked, so the
    /// producer's admission scan observes the claim immediately and
    /// cannot race into the slot this call is about to read. The call
    /// then spins until the reserved position is published.
    pub fn get(&mut self) -> T {
        let ring = &*self.ring;
        let position = ring.registry.reserve_next(self.slot_id);

        while !ring.is_published(position) {
            thread::yield_now();
        }

        // Safety: the position is published, and the reservation above
        // holds the producer at least `capacity` positions away from
        // overwriting it.
        unsafe { ring.storage.load(position) }
    }

    /// Index of the table slot this handle occupies. A later consumer may
    /// reuse the index after this handle is removed.
    pub fn slot_id(&self) -> usize {
        self.slot_id
    }

    /// Deregister this consumer, immediately relaxing the producer's
    /// admission constraint on its next scan. Consuming `self` makes a
    /// double removal unrepresentable; dropping the handle is equivalent.
    pub fn remove(self) {}
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        self.ring.registry.release(self.slot_id);
    }
}
