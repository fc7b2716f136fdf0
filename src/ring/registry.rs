//! Lock-free consumer slot table.
//!
//! Registration and removal coordinate purely through compare-and-swap on
//! a per-slot tri-state flag. The intermediate Claiming state keeps a
//! half-seeded read counter invisible to both the producer's admission
//! scan and rival claimers, which is what lets this table do without the
//! registration mutex earlier iterations of the design carried.

use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};

use crate::error::{Result, RingError};

use super::index::distance;
use super::Sequence;

// Per-slot states. Transitions: FREE -> CLAIMING -> ACTIVE -> FREE.
const FREE: u8 = 0;
const CLAIMING: u8 = 1;
const ACTIVE: u8 = 2;

/// One consumer slot, padded to its own cache line so the producer's
/// admission scan does not false-share with consumer-side increments.
#[repr(align(128))]
struct ConsumerSlot {
    state: AtomicU8,
    read_counter: AtomicU32,
}

impl ConsumerSlot {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(FREE),
            read_counter: AtomicU32::new(0),
        }
    }
}

pub(crate) struct ConsumerRegistry {
    slots: Box<[ConsumerSlot]>,
    /// Exclusive upper bound on slot indices the admission scan examines.
    /// Never below any active slot's index + 1; transient overshoot after
    /// a release only costs scan iterations, not correctness.
    high_water_mark: AtomicUsize,
}

impl ConsumerRegistry {
    pub(crate) fn new(max_consumers: usize) -> Self {
        let slots = (0..max_consumers)
            .map(|_| ConsumerSlot::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            high_water_mark: AtomicUsize::new(0),
        }
    }

    /// Claim a free slot, seeding its cursor one position behind
    /// `write_counter` so the first read returns the first value written
    /// after the claim.
    ///
    /// The table is scanned once; a slot lost to a racing claimer is
    /// skipped, not retried. An exhausted table is `MaxConsumersReached`.
    pub(crate) fn claim(&self, write_counter: Sequence) -> Result<usize> {
        for (slot_id, slot) in self.slots.iter().enumerate() {
            if slot
                .state
                .compare_exchange(FREE, CLAIMING, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }

            // CLAIMING shields this store from the admission scan.
            slot.read_counter
                .store(write_counter.wrapping_sub(1), Ordering::Relaxed);

            // Raise the mark before activation so the scan covers this
            // slot from its first ACTIVE instant.
            self.high_water_mark.fetch_max(slot_id + 1, Ordering::AcqRel);
            slot.state.store(ACTIVE, Ordering::Release);

            trace_debug!("claimed consumer slot {slot_id} at position {write_counter}");
            return Ok(slot_id);
        }

        Err(RingError::MaxConsumersReached {
            limit: self.slots.len(),
        })
    }

    /// Free a slot. If it was the table's tail, try once to shrink the
    /// high-water mark; losing that race only costs one extra scan
    /// iteration until a later release shrinks past it.
    pub(crate) fn release(&self, slot_id: usize) {
        self.slots[slot_id].state.store(FREE, Ordering::Release);

        let _ = self.high_water_mark.compare_exchange(
            slot_id + 1,
            slot_id,
            Ordering::AcqRel,
            Ordering::Relaxed,
        );

        trace_debug!("released consumer slot {slot_id}");
    }

    /// Admission scan: wrapping lag of the slowest active consumer, or
    /// `None` when nothing is listening. O(high-water mark), not
    /// O(table size).
    pub(crate) fn max_lag(&self, write_counter: Sequence) -> Option<Sequence> {
        let bound = self.high_water_mark.load(Ordering::Acquire);
        let mut worst = None;

        for slot in self.slots.iter().take(bound) {
            if slot.state.load(Ordering::Acquire) != ACTIVE {
                continue;
            }
            let lag = distance(write_counter, slot.read_counter.load(Ordering::Acquire));
            if worst.map_or(true, |w| lag > w) {
                worst = Some(lag);
            }
        }

        worst
    }

    /// Advance `slot_id`'s cursor and return the reserved position. The
    /// release ordering publishes the reservation to the admission scan
    /// before the caller starts waiting on it.
    #[inline(always)]
    pub(crate) fn reserve_next(&self, slot_id: usize) -> Sequence {
        self.slots[slot_id]
            .read_counter
            .fetch_add(1, Ordering::Release)
            .wrapping_add(1)
    }

    /// Number of currently active slots. Approximate under concurrent
    /// claims/releases; meant for diagnostics and tests.
    pub(crate) fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state.load(Ordering::Acquire) == ACTIVE)
            .count()
    }

    pub(crate) fn limit(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_assigns_lowest_free_slot() {
        let registry = ConsumerRegistry::new(4);
        assert_eq!(registry.claim(0).unwrap(), 0);
        assert_eq!(registry.claim(0).unwrap(), 1);
        assert_eq!(registry.high_water_mark.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_claim_exhausted_table_errors() {
        let registry = ConsumerRegistry::new(2);
        registry.claim(0).unwrap();
        registry.claim(0).unwrap();
        assert_eq!(
            registry.claim(0).unwrap_err(),
            RingError::MaxConsumersReached { limit: 2 }
        );
    }

    #[test]
    fn test_release_makes_slot_reusable() {
        let registry = ConsumerRegistry::new(1);
        let slot_id = registry.claim(10).unwrap();
        registry.release(slot_id);
        assert_eq!(registry.claim(20).unwrap(), slot_id);
    }

    #[test]
    fn test_release_of_tail_shrinks_mark() {
        let registry = ConsumerRegistry::new(4);
        registry.claim(0).unwrap();
        let tail = registry.claim(0).unwrap();
        registry.release(tail);
        assert_eq!(registry.high_water_mark.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_release_of_interior_slot_keeps_mark() {
        let registry = ConsumerRegistry::new(4);
        let first = registry.claim(0).unwrap();
        registry.claim(0).unwrap();
        registry.release(first);
        // Mark overshoots until the tail is released; the scan skips the
        // freed slot by state, so this is only a cost, not a bug.
        assert_eq!(registry.high_water_mark.load(Ordering::Relaxed), 2);
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn test_fresh_claim_lags_by_one() {
        let registry = ConsumerRegistry::new(2);
        registry.claim(5).unwrap();
        assert_eq!(registry.max_lag(5), Some(1));
    }

    #[test]
    fn test_max_lag_none_when_table_empty() {
        let registry = ConsumerRegistry::new(4);
        assert_eq!(registry.max_lag(100), None);

        let slot_id = registry.claim(100).unwrap();
        registry.release(slot_id);
        assert_eq!(registry.max_lag(100), None);
    }

    #[test]
    fn test_max_lag_tracks_slowest_consumer() {
        let registry = ConsumerRegistry::new(4);
        let slow = registry.claim(0).unwrap();
        let fast = registry.claim(0).unwrap();

        // slow stays seeded at -1, fast consumes three positions
        for _ in 0..3 {
            registry.reserve_next(fast);
        }
        let _ = slow;

        assert_eq!(registry.max_lag(3), Some(4));
    }

    #[test]
    fn test_reserve_next_returns_post_increment_position() {
        let registry = ConsumerRegistry::new(1);
        let slot_id = registry.claim(0).unwrap();
        // Seeded at -1 (wrapping), so the first reservation is position 0.
        assert_eq!(registry.reserve_next(slot_id), 0);
        assert_eq!(registry.reserve_next(slot_id), 1);
    }

    #[test]
    fn test_seed_survives_wrap_boundary() {
        let registry = ConsumerRegistry::new(1);
        let slot_id = registry.claim(0).unwrap();
        assert_eq!(
            registry.slots[slot_id].read_counter.load(Ordering::Relaxed),
            u32::MAX
        );
        assert_eq!(registry.max_lag(0), Some(1));
    }
}
