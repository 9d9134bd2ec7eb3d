//! Device buffer pool and in-flight net slots.
//!
//! Allocates the device-resident routing state once, up front: per-wire
//! cost and uphill-edge cells, the paired near queues, the far queue, the
//! dirtied-node list (all segmented per workgroup), and the per-slot
//! configuration records. Slots hand their workgroup range and queue
//! segments to one net at a time; teardown returns them clean.

use crate::config::RouterConfig;
use crate::graph::{INF_COST, NO_EDGE};
use ocular_arch::Rect;
use ocular_compute::{AtomicCostArray, AtomicIndexArray};
use std::ops::Range;

/// Per-in-flight-net kernel configuration.
#[derive(Debug, Clone, Copy)]
pub struct NetConfig {
    /// Slack-expanded bounding box the kernel clips expansion to.
    pub bb: Rect,
    /// Near-queue capacity per workgroup.
    pub near_queue_size: u32,
    /// Far-queue capacity per workgroup.
    pub far_queue_size: u32,
    /// Dirtied-list capacity per workgroup.
    pub dirty_queue_size: u32,
    /// First workgroup assigned to this net.
    pub net_start: u32,
    /// One past the last workgroup assigned to this net.
    pub net_end: u32,
    /// Congestion cost multiplier for this pass, in picoseconds.
    pub curr_cong_cost: f32,
    /// Costs below this stay in the near frontier; others defer to far.
    pub near_far_thresh: i32,
    /// Queue segment stride (nodes per workgroup).
    pub group_nodes: u32,
}

impl NetConfig {
    /// Returns the workgroups assigned to this net.
    pub fn groups(&self) -> Range<u32> {
        self.net_start..self.net_end
    }

    /// Returns the workgroup owning pushes of the given wire.
    pub fn owning_group(&self, wire: u32) -> u32 {
        self.net_start + wire % (self.net_end - self.net_start)
    }
}

/// One in-flight net slot; `net_idx` is `-1` when the slot is free.
#[derive(Debug, Clone, Copy)]
pub struct InFlightSlot {
    /// Index into the imported net list, or `-1`.
    pub net_idx: i32,
}

/// Static per-workgroup dispatch configuration.
#[derive(Debug, Clone, Copy)]
pub struct WorkgroupConfig {
    /// Slot the workgroup currently serves, or `-1`.
    pub slot: i32,
    /// Work-items per workgroup.
    pub size: u32,
}

/// Overflow flag bit for the near queue.
pub const OVERFLOW_NEAR: u32 = 1;
/// Overflow flag bit for the far queue.
pub const OVERFLOW_FAR: u32 = 2;
/// Overflow flag bit for the dirtied-node list.
pub const OVERFLOW_DIRTY: u32 = 4;

/// The device-resident routing state shared by all in-flight nets.
#[derive(Debug)]
pub struct DevicePool {
    /// Per-wire current cost; `INF_COST` when untouched.
    pub current_cost: AtomicCostArray,
    /// Per-wire uphill edge used to reach it; `NO_EDGE` when untouched.
    pub uphill_edge: AtomicIndexArray,
    /// Near queue A, segmented per workgroup.
    pub near_queue_a: AtomicIndexArray,
    /// Near queue B, segmented per workgroup.
    pub near_queue_b: AtomicIndexArray,
    /// Entry counts for near queue A, per workgroup.
    pub near_count_a: AtomicIndexArray,
    /// Entry counts for near queue B, per workgroup.
    pub near_count_b: AtomicIndexArray,
    /// Far queue, segmented per workgroup.
    pub far_queue: AtomicIndexArray,
    /// Entry counts for the far queue, per workgroup.
    pub far_count: AtomicIndexArray,
    /// Dirtied-node list, segmented per workgroup.
    pub dirtied_nodes: AtomicIndexArray,
    /// Entry counts for the dirtied-node list, per workgroup.
    pub dirtied_count: AtomicIndexArray,
    /// Per-workgroup overflow flag bits.
    pub overflow_flags: AtomicIndexArray,
    /// In-flight slot table.
    pub slots: Vec<InFlightSlot>,
    /// Per-workgroup dispatch configuration.
    pub wg_config: Vec<WorkgroupConfig>,
    groups_per_slot: u32,
}

impl DevicePool {
    /// Allocates the pool for a graph of `num_wires` wires.
    pub fn new(config: &RouterConfig, num_wires: usize) -> Self {
        let wg = config.num_workgroups as usize;
        Self {
            current_cost: AtomicCostArray::new(num_wires, INF_COST),
            uphill_edge: AtomicIndexArray::new(num_wires, NO_EDGE),
            near_queue_a: AtomicIndexArray::new(wg * config.near_queue_len as usize, 0),
            near_queue_b: AtomicIndexArray::new(wg * config.near_queue_len as usize, 0),
            near_count_a: AtomicIndexArray::new(wg, 0),
            near_count_b: AtomicIndexArray::new(wg, 0),
            far_queue: AtomicIndexArray::new(wg * config.far_queue_len as usize, 0),
            far_count: AtomicIndexArray::new(wg, 0),
            dirtied_nodes: AtomicIndexArray::new(wg * config.dirty_queue_len as usize, 0),
            dirtied_count: AtomicIndexArray::new(wg, 0),
            overflow_flags: AtomicIndexArray::new(wg, 0),
            slots: vec![InFlightSlot { net_idx: -1 }; config.max_nets_in_flight as usize],
            wg_config: vec![
                WorkgroupConfig {
                    slot: -1,
                    size: config.workgroup_size,
                };
                wg
            ],
            groups_per_slot: config.groups_per_slot(),
        }
    }

    /// Returns the first free slot, if any.
    pub fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.net_idx < 0)
    }

    /// Returns the workgroup range owned by a slot.
    pub fn slot_groups(&self, slot: usize) -> Range<u32> {
        let start = slot as u32 * self.groups_per_slot;
        start..start + self.groups_per_slot
    }

    /// Marks a slot as expanding the given net.
    pub fn occupy(&mut self, slot: usize, net_idx: usize) {
        debug_assert!(self.slots[slot].net_idx < 0);
        self.slots[slot].net_idx = net_idx as i32;
        for g in self.slot_groups(slot) {
            self.wg_config[g as usize].slot = slot as i32;
        }
    }

    /// Returns a slot to the free pool.
    pub fn vacate(&mut self, slot: usize) {
        self.slots[slot].net_idx = -1;
        for g in self.slot_groups(slot) {
            self.wg_config[g as usize].slot = -1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> RouterConfig {
        RouterConfig {
            num_workgroups: 8,
            workgroup_size: 16,
            near_queue_len: 64,
            far_queue_len: 128,
            dirty_queue_len: 128,
            max_nets_in_flight: 4,
            ..RouterConfig::default()
        }
    }

    #[test]
    fn allocation_sizes() {
        let config = small_config();
        let pool = DevicePool::new(&config, 100);
        assert_eq!(pool.current_cost.len(), 100);
        assert_eq!(pool.uphill_edge.len(), 100);
        assert_eq!(pool.near_queue_a.len(), 8 * 64);
        assert_eq!(pool.far_queue.len(), 8 * 128);
        assert_eq!(pool.slots.len(), 4);
        assert_eq!(pool.wg_config.len(), 8);
    }

    #[test]
    fn initial_state_is_clean() {
        let pool = DevicePool::new(&small_config(), 10);
        assert!(pool.current_cost.snapshot().iter().all(|&c| c == INF_COST));
        assert!(pool.uphill_edge.snapshot().iter().all(|&e| e == NO_EDGE));
        assert!(pool.near_count_a.snapshot().iter().all(|&c| c == 0));
    }

    #[test]
    fn slot_group_ranges_are_disjoint() {
        let pool = DevicePool::new(&small_config(), 10);
        assert_eq!(pool.slot_groups(0), 0..2);
        assert_eq!(pool.slot_groups(1), 2..4);
        assert_eq!(pool.slot_groups(3), 6..8);
    }

    #[test]
    fn occupy_and_vacate() {
        let mut pool = DevicePool::new(&small_config(), 10);
        assert_eq!(pool.free_slot(), Some(0));
        pool.occupy(0, 7);
        assert_eq!(pool.free_slot(), Some(1));
        assert_eq!(pool.wg_config[0].slot, 0);
        assert_eq!(pool.wg_config[1].slot, 0);
        assert_eq!(pool.wg_config[2].slot, -1);
        pool.vacate(0);
        assert_eq!(pool.free_slot(), Some(0));
        assert_eq!(pool.wg_config[0].slot, -1);
    }

    #[test]
    fn owning_group_stays_in_range() {
        let cfg = NetConfig {
            bb: Rect::new(0, 0, 3, 3),
            near_queue_size: 64,
            far_queue_size: 128,
            dirty_queue_size: 128,
            net_start: 4,
            net_end: 6,
            curr_cong_cost: 1000.0,
            near_far_thresh: 10_000,
            group_nodes: 64,
        };
        for wire in 0..100 {
            let g = cfg.owning_group(wire);
            assert!(cfg.groups().contains(&g));
        }
    }
}
