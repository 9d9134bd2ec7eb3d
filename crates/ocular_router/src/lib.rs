//! GPGPU-style negotiated-congestion global router.
//!
//! Given a routing graph and a set of nets from an architecture context,
//! the router assigns each net a tree of PIPs carrying signal from its
//! driver to every sink, negotiating congestion until no wire carries more
//! nets than its capacity. The per-net expansion is a work-efficient
//! parallel SSSP with a near/far bucketed frontier, executed by the
//! workgroup dispatcher in `ocular_compute`; a host-side admission layer
//! keeps the bounding boxes of concurrently-expanded nets disjoint so
//! their cost updates never interfere.
//!
//! # Pipeline
//!
//! 1. **Graph import** — flatten wires and PIPs into CSR device layout
//! 2. **Net import** — bounding boxes, fixed/loose classification
//! 3. **Negotiation** — admit, expand, trace back, bind; escalate
//!    congestion costs and rip up offenders until clean
//!
//! # Usage
//!
//! ```
//! use ocular_arch::{Delay, FabricModel, Loc};
//! use ocular_router::{route, RouterConfig};
//!
//! let mut fabric = FabricModel::new(2, 1);
//! let a = fabric.add_wire("a", Loc::new(0, 0)).unwrap();
//! let b = fabric.add_wire("b", Loc::new(1, 0)).unwrap();
//! fabric.add_pip(a, b, Delay::from_ns(0.1));
//! fabric.add_net("n", Some(a), vec![b]);
//!
//! let config = RouterConfig {
//!     num_workgroups: 4,
//!     workgroup_size: 8,
//!     near_queue_len: 64,
//!     far_queue_len: 128,
//!     dirty_queue_len: 128,
//!     max_nets_in_flight: 2,
//!     ..RouterConfig::default()
//! };
//! assert!(route(&mut fabric, &config).unwrap());
//! ```

#![warn(missing_docs)]

pub mod admission;
pub mod config;
mod driver;
pub mod error;
pub mod graph;
pub mod kernel;
pub mod nets;
pub mod pool;
pub mod serial;

pub use config::RouterConfig;
pub use error::{RouteResult, RouterError};
pub use graph::RouterGraph;
pub use nets::{ImportedNets, NetRecord};

use ocular_arch::RoutingContext;

/// Routes every net in the context.
///
/// Builds the device graph, imports the nets, and runs the negotiated
/// congestion loop. Returns `Ok(true)` iff every routable net was connected
/// with zero overuse; `Ok(false)` means the pass limit was reached with
/// conflicts or unrouted nets remaining.
///
/// # Errors
///
/// Fatal errors — malformed architecture data, conflicting or incomplete
/// locked routing, inconsistent configuration — abort routing and surface
/// here. Per-net recoverable conditions (queue overflow, round caps) are
/// handled inside the loop and never escape.
pub fn route(ctx: &mut dyn RoutingContext, config: &RouterConfig) -> RouteResult<bool> {
    config.validate()?;
    let mut graph = graph::RouterGraph::build(ctx)?;
    let mut bound_count = vec![0u8; graph.num_wires()];
    let mut nets = nets::import_nets(ctx, &graph, &mut bound_count)?;
    driver::run_negotiation(ctx, &mut graph, &mut nets, &mut bound_count, config)
}
