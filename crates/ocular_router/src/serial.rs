//! Serial fallback expansion for nets the device could not hold.
//!
//! When a slot aborts on queue overflow, the driver reroutes the net here:
//! a host-side Dijkstra over the same CSR graph with the same congestion
//! cost model, so the negotiation semantics are identical to the kernel's.

use crate::graph::{RouterGraph, INF_COST};
use crate::pool::NetConfig;
use ocular_arch::Loc;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// A search state in the priority queue.
#[derive(Debug, Clone, Copy)]
struct SearchState {
    wire: u32,
    cost: i32,
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for SearchState {}

impl Ord for SearchState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap (BinaryHeap is max-heap by default);
        // ties pop the lower wire index first for determinism.
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.wire.cmp(&self.wire))
    }
}

impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The host-side expansion result: best cost and uphill edge per reached wire.
#[derive(Debug, Default)]
pub struct SerialExpansion {
    costs: HashMap<u32, i32>,
    uphill: HashMap<u32, u32>,
}

impl SerialExpansion {
    /// Returns the best-known cost of a wire, or `INF_COST` if unreached.
    pub fn cost(&self, wire: u32) -> i32 {
        self.costs.get(&wire).copied().unwrap_or(INF_COST)
    }

    /// Returns the uphill edge recorded for a wire.
    pub fn uphill(&self, wire: u32) -> Option<u32> {
        self.uphill.get(&wire).copied()
    }
}

/// Expands `source`'s shortest-path tree on the host, clipped to the
/// config's bounding box, with the same cost model as the device kernel.
pub fn expand_serial(
    graph: &RouterGraph,
    cfg: &NetConfig,
    bound_count: &[u8],
    capacity: u8,
    present_slope: f32,
    source: u32,
) -> SerialExpansion {
    let adj = graph.adj_offset.host();
    let edge_dst = graph.edge_dst.host();
    let edge_cost = graph.edge_cost.host();
    let wire_x = graph.wire_x.host();
    let wire_y = graph.wire_y.host();

    let mut out = SerialExpansion::default();
    out.costs.insert(source, 0);
    let mut open = BinaryHeap::new();
    open.push(SearchState {
        wire: source,
        cost: 0,
    });

    while let Some(current) = open.pop() {
        if current.cost > out.cost(current.wire) {
            continue; // Stale entry
        }
        let u = current.wire as usize;
        for e in adj[u]..adj[u + 1] {
            let v = edge_dst[e as usize];
            let loc = Loc::new(wire_x[v as usize], wire_y[v as usize]);
            if !cfg.bb.contains(loc) {
                continue;
            }
            let occupancy = bound_count[v as usize] as u32 + 1;
            let present = if occupancy <= capacity as u32 {
                1.0
            } else {
                1.0 + present_slope * (occupancy - capacity as u32) as f32
            };
            let penalty = (cfg.curr_cong_cost * present).round() as i32;
            let tentative = current
                .cost
                .saturating_add(edge_cost[e as usize])
                .saturating_add(penalty);
            if tentative >= INF_COST {
                continue;
            }
            let best = out.cost(v);
            if tentative < best {
                out.costs.insert(v, tentative);
                out.uphill.insert(v, e);
                open.push(SearchState {
                    wire: v,
                    cost: tentative,
                });
            } else if tentative == best {
                // Same tie-break as the kernel: lower edge index wins.
                if let Some(prev) = out.uphill.get_mut(&v) {
                    if e < *prev {
                        *prev = e;
                    }
                }
            }
        }
    }
    out
}
