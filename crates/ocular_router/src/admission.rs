//! Spatial admission control for in-flight nets.
//!
//! A 2-D grid reservation map decides which nets may expand on the device
//! at the same time: a net is admitted only if every tile of its
//! (slack-expanded) bounding box is unclaimed, so the per-wire cost cells
//! written by concurrent kernels are guaranteed disjoint.

use ocular_arch::Rect;

/// Grid value for an unreserved tile.
const FREE: i8 = -1;

/// The grid reservation map and per-slot reservations.
#[derive(Debug)]
pub struct AdmissionController {
    grid2net: Vec<i8>,
    width: u16,
    height: u16,
    reserved: Vec<Option<Rect>>,
}

impl AdmissionController {
    /// Creates an empty reservation map for the given grid and slot count.
    pub fn new(width: u16, height: u16, max_slots: usize) -> Self {
        Self {
            grid2net: vec![FREE; width as usize * height as usize],
            width,
            height,
            reserved: vec![None; max_slots],
        }
    }

    /// Returns whether every tile of `bb` currently holds `value`.
    fn check_region(&self, bb: &Rect, value: i8) -> bool {
        for y in bb.y0..=bb.y1 {
            debug_assert!(y >= 0 && (y as u16) < self.height);
            for x in bb.x0..=bb.x1 {
                debug_assert!(x >= 0 && (x as u16) < self.width);
                if self.grid2net[y as usize * self.width as usize + x as usize] != value {
                    return false;
                }
            }
        }
        true
    }

    /// Writes `value` into every tile of `bb`.
    fn mark_region(&mut self, bb: &Rect, value: i8) {
        for y in bb.y0..=bb.y1 {
            debug_assert!(y >= 0 && (y as u16) < self.height);
            for x in bb.x0..=bb.x1 {
                debug_assert!(x >= 0 && (x as u16) < self.width);
                self.grid2net[y as usize * self.width as usize + x as usize] = value;
            }
        }
    }

    /// Attempts to reserve `bb` for `slot`. Returns `false` (and reserves
    /// nothing) if any tile is already claimed.
    pub fn try_admit(&mut self, slot: usize, bb: Rect) -> bool {
        debug_assert!(self.reserved[slot].is_none());
        if !self.check_region(&bb, FREE) {
            return false;
        }
        self.mark_region(&bb, slot as i8);
        self.reserved[slot] = Some(bb);
        true
    }

    /// Releases the reservation held by `slot`.
    pub fn release(&mut self, slot: usize) {
        if let Some(bb) = self.reserved[slot].take() {
            self.mark_region(&bb, FREE);
        }
    }

    /// Returns the bounding boxes currently reserved, for overlap auditing.
    pub fn in_flight_regions(&self) -> Vec<Rect> {
        self.reserved.iter().filter_map(|r| *r).collect()
    }
}
