//! Atomic device cell arrays shared between host and kernel.
//!
//! Routing state that concurrent work-items mutate — per-wire costs,
//! predecessor edges, queue storage, queue counters — lives in these arrays.
//! All operations use relaxed ordering: correctness rests on value
//! monotonicity (costs only decrease within a launch) and on the dispatch
//! barrier between rounds, not on cross-cell ordering.

use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

/// An array of 32-bit signed cost cells.
#[derive(Debug)]
pub struct AtomicCostArray {
    cells: Vec<AtomicI32>,
}

impl AtomicCostArray {
    /// Creates an array of `len` cells initialised to `init`.
    pub fn new(len: usize, init: i32) -> Self {
        Self {
            cells: (0..len).map(|_| AtomicI32::new(init)).collect(),
        }
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Loads the cell value.
    pub fn load(&self, idx: usize) -> i32 {
        self.cells[idx].load(Ordering::Relaxed)
    }

    /// Stores a value into the cell.
    pub fn store(&self, idx: usize, value: i32) {
        self.cells[idx].store(value, Ordering::Relaxed);
    }

    /// Attempts to replace `current` with `new` in the cell.
    ///
    /// On failure returns the value actually observed, for CAS loops.
    pub fn compare_exchange(&self, idx: usize, current: i32, new: i32) -> Result<i32, i32> {
        self.cells[idx].compare_exchange(current, new, Ordering::Relaxed, Ordering::Relaxed)
    }

    /// Copies the current cell values into a host vector.
    pub fn snapshot(&self) -> Vec<i32> {
        self.cells.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }
}

/// An array of 32-bit unsigned index cells, also used as queue counters.
#[derive(Debug)]
pub struct AtomicIndexArray {
    cells: Vec<AtomicU32>,
}

impl AtomicIndexArray {
    /// Creates an array of `len` cells initialised to `init`.
    pub fn new(len: usize, init: u32) -> Self {
        Self {
            cells: (0..len).map(|_| AtomicU32::new(init)).collect(),
        }
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Loads the cell value.
    pub fn load(&self, idx: usize) -> u32 {
        self.cells[idx].load(Ordering::Relaxed)
    }

    /// Stores a value into the cell.
    pub fn store(&self, idx: usize, value: u32) {
        self.cells[idx].store(value, Ordering::Relaxed);
    }

    /// Adds `value` to the cell and returns the previous value
    /// (queue-slot reservation).
    pub fn fetch_add(&self, idx: usize, value: u32) -> u32 {
        self.cells[idx].fetch_add(value, Ordering::Relaxed)
    }

    /// Lowers the cell to `value` if `value` is smaller.
    ///
    /// Returns the previous value.
    pub fn fetch_min(&self, idx: usize, value: u32) -> u32 {
        self.cells[idx].fetch_min(value, Ordering::Relaxed)
    }

    /// ORs `value` into the cell and returns the previous value (flag bits).
    pub fn fetch_or(&self, idx: usize, value: u32) -> u32 {
        self.cells[idx].fetch_or(value, Ordering::Relaxed)
    }

    /// Copies the current cell values into a host vector.
    pub fn snapshot(&self) -> Vec<u32> {
        self.cells.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_cas_success_and_failure() {
        let costs = AtomicCostArray::new(2, 100);
        assert_eq!(costs.compare_exchange(0, 100, 50), Ok(100));
        assert_eq!(costs.load(0), 50);
        // Stale expectation fails and reports the observed value.
        let r = costs.compare_exchange(0, 100, 25);
        assert_eq!(r, Err(50));
        assert_eq!(costs.load(1), 100);
    }

    #[test]
    fn cost_snapshot() {
        let costs = AtomicCostArray::new(3, 7);
        costs.store(1, 9);
        assert_eq!(costs.snapshot(), vec![7, 9, 7]);
    }

    #[test]
    fn index_fetch_add_reserves_slots() {
        let counts = AtomicIndexArray::new(1, 0);
        assert_eq!(counts.fetch_add(0, 1), 0);
        assert_eq!(counts.fetch_add(0, 1), 1);
        assert_eq!(counts.load(0), 2);
    }

    #[test]
    fn index_fetch_min() {
        let cells = AtomicIndexArray::new(1, u32::MAX);
        cells.fetch_min(0, 10);
        cells.fetch_min(0, 20);
        assert_eq!(cells.load(0), 10);
    }

    #[test]
    fn concurrent_reservation_is_exact() {
        use rayon::prelude::*;
        let counts = AtomicIndexArray::new(1, 0);
        (0..1000u32).into_par_iter().for_each(|_| {
            counts.fetch_add(0, 1);
        });
        assert_eq!(counts.load(0), 1000);
    }
}
