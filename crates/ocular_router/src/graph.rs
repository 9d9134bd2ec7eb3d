//! Device-side routing graph import.
//!
//! Flattens the architecture's wire/PIP graph into the CSR adjacency layout
//! the expansion kernel consumes: per-wire centroids for bounding-box tests,
//! `adj_offset` into a flat edge list, integer edge costs in picoseconds,
//! and a host-only parallel array correlating each edge back to its PIP.
//! The graph is immutable after construction except for `edge_cost`, which
//! the negotiation driver escalates between passes.

use crate::error::{RouteResult, RouterError};
use ocular_arch::{Loc, PipId, RoutingContext, WireId};
use ocular_compute::{BackedBuffer, BufferUsage};
use std::collections::HashMap;

/// Sentinel cost for a wire the current expansion has not reached.
pub const INF_COST: i32 = 0x07FF_FFFF;

/// Sentinel for a wire with no recorded uphill edge.
pub const NO_EDGE: u32 = u32::MAX;

/// Conversion from float nanoseconds to integer picoseconds.
const DELAY_SCALE: f64 = 1000.0;

/// The flattened routing graph in device layout.
#[derive(Debug)]
pub struct RouterGraph {
    /// Wire centroid columns, by wire index.
    pub wire_x: BackedBuffer<i16>,
    /// Wire centroid rows, by wire index.
    pub wire_y: BackedBuffer<i16>,
    /// CSR offsets into the edge arrays; length `num_wires + 1`.
    pub adj_offset: BackedBuffer<u32>,
    /// Destination wire index of each edge.
    pub edge_dst: BackedBuffer<u32>,
    /// Current cost of each edge in picoseconds (base delay plus
    /// accumulated congestion history).
    pub edge_cost: BackedBuffer<i32>,
    /// Architecture PIP behind each edge (host-only; the device never
    /// sees it, but binding results needs it).
    pub edge_pip: Vec<PipId>,
    /// Architecture wire handle behind each wire index.
    pub wire_handles: Vec<WireId>,
    /// Reverse map from wire handle to dense index.
    pub wire_to_index: HashMap<WireId, u32>,
    /// Grid width derived from the wire extents.
    pub width: u16,
    /// Grid height derived from the wire extents.
    pub height: u16,
}

impl RouterGraph {
    /// Imports the routing graph from the architecture context.
    ///
    /// Wires are indexed in context enumeration order. Edges skip PIPs that
    /// are permanently unavailable and destinations that are not routable.
    /// Edge cost is the PIP delay plus the destination wire delay, slow
    /// corner, in picoseconds.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::GraphBuild`] if a wire's centroid lies
    /// outside the grid (negative coordinates).
    pub fn build(ctx: &dyn RoutingContext) -> RouteResult<Self> {
        let mut graph = Self {
            wire_x: BackedBuffer::new(BufferUsage::ReadOnly),
            wire_y: BackedBuffer::new(BufferUsage::ReadOnly),
            adj_offset: BackedBuffer::new(BufferUsage::ReadOnly),
            edge_dst: BackedBuffer::new(BufferUsage::ReadOnly),
            edge_cost: BackedBuffer::new(BufferUsage::ReadWrite),
            edge_pip: Vec::new(),
            wire_handles: Vec::new(),
            wire_to_index: HashMap::new(),
            width: 0,
            height: 0,
        };

        for wire in ctx.wires() {
            let bb = ctx.wire_bbox(wire);
            let cx = (bb.x0 + bb.x1) / 2;
            let cy = (bb.y0 + bb.y1) / 2;
            if cx < 0 || cy < 0 {
                return Err(RouterError::GraphBuild(format!(
                    "wire {} has centroid ({cx}, {cy}) outside the grid",
                    wire.as_raw()
                )));
            }
            graph.wire_x.push(cx);
            graph.wire_y.push(cy);
            graph
                .wire_to_index
                .insert(wire, graph.wire_handles.len() as u32);
            graph.wire_handles.push(wire);
            graph.width = graph.width.max(bb.x1 as u16 + 1);
            graph.height = graph.height.max(bb.y1 as u16 + 1);
        }

        for i in 0..graph.wire_handles.len() {
            let w = graph.wire_handles[i];
            graph.adj_offset.push(graph.edge_dst.len() as u32);
            for pip in ctx.downhill_pips(w) {
                // Skip permanently unavailable pips and pips bound before
                // the router runs (e.g. dedicated clock spines).
                if !ctx.pip_avail(pip) {
                    continue;
                }
                let dst = ctx.pip_dst(pip);
                if !ctx.wire_avail(dst) {
                    continue;
                }
                let base_cost = ((ctx.pip_delay(pip).max_ns + ctx.wire_delay(dst).max_ns)
                    * DELAY_SCALE)
                    .round() as i32;
                graph.edge_cost.push(base_cost);
                graph.edge_dst.push(graph.wire_to_index[&dst]);
                graph.edge_pip.push(pip);
            }
        }
        // Final offset closes the list for the last wire.
        graph.adj_offset.push(graph.edge_dst.len() as u32);

        graph.wire_x.upload();
        graph.wire_y.upload();
        graph.adj_offset.upload();
        graph.edge_dst.upload();
        graph.edge_cost.upload();

        log::info!(
            "imported routing graph: {} wires, {} edges, {}x{} grid",
            graph.num_wires(),
            graph.num_edges(),
            graph.width,
            graph.height
        );
        Ok(graph)
    }

    /// Returns the number of wires.
    pub fn num_wires(&self) -> usize {
        self.wire_handles.len()
    }

    /// Returns the number of edges.
    pub fn num_edges(&self) -> usize {
        self.edge_pip.len()
    }

    /// Returns the centroid of a wire.
    pub fn centroid(&self, wire: u32) -> Loc {
        Loc::new(
            self.wire_x.host()[wire as usize],
            self.wire_y.host()[wire as usize],
        )
    }

    /// Returns the source wire of an edge by binary search over the CSR
    /// offsets.
    pub fn edge_src(&self, edge: u32) -> u32 {
        let offsets = self.adj_offset.host();
        offsets.partition_point(|&off| off <= edge) as u32 - 1
    }
}
