//! Fixed array of payload cells, indexed by masked position counters.

use std::cell::UnsafeCell;

use super::index::slot_of;
use super::Sequence;

/// Payload storage with no synchronization of its own. The facade
/// guarantees that only the producer calls `store`, and that a consumer
/// only calls `load` for a position the write counter has published and
/// the admission check still protects from overwrite.
pub(crate) struct SlotStorage<T> {
    cells: Box<[UnsafeCell<T>]>,
    mask: Sequence,
}

impl<T: Clone + Default> SlotStorage<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());

        let cells = (0..capacity)
            .map(|_| UnsafeCell::new(T::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            cells,
            mask: (capacity - 1) as Sequence,
        }
    }

    /// Write the value for `counter` into its slot, dropping the previous
    /// occupant.
    ///
    /// # Safety
    ///
    /// - Only the single producer may call this.
    /// - No consumer may be reading this slot: the caller must have passed
    ///   the admission check for `counter` first.
    #[inline(always)]
    pub(crate) unsafe fn store(&self, counter: Sequence, value: T) {
        *self.cells[slot_of(counter, self.mask)].get() = value;
    }

    /// Clone the value for `counter` out of its slot.
    ///
    /// # Safety
    ///
    /// - `counter` must be published (write counter advanced past it).
    /// - The caller's reservation must still gate the producer from
    ///   overwriting this slot.
    #[inline(always)]
    pub(crate) unsafe fn load(&self, counter: Sequence) -> T {
        (*self.cells[slot_of(counter, self.mask)].get()).clone()
    }
}

unsafe impl<T: Send> Send for SlotStorage<T> {}
unsafe impl<T: Send + Sync> Sync for SlotStorage<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_then_load_roundtrip() {
        let storage = SlotStorage::<u64>::new(8);
        unsafe {
            storage.store(3, 42);
            assert_eq!(storage.load(3), 42);
        }
    }

    #[test]
    fn test_counters_a_capacity_apart_share_a_slot() {
        let storage = SlotStorage::<u64>::new(4);
        unsafe {
            storage.store(1, 10);
            storage.store(5, 20);
            assert_eq!(storage.load(1), 20);
        }
    }

    #[test]
    fn test_indexing_survives_counter_wrap() {
        let storage = SlotStorage::<String>::new(2);
        unsafe {
            storage.store(u32::MAX, "old".to_string());
            assert_eq!(storage.load(u32::MAX), "old");
            storage.store(u32::MAX.wrapping_add(2), "new".to_string());
            assert_eq!(storage.load(u32::MAX), "new");
        }
    }
}
