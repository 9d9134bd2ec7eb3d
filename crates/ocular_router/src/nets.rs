//! Net import and classification.
//!
//! Snapshots every net from the architecture context into the router's flat
//! records: bounding box over driver and sinks, driven/undriven and
//! fixed/ripuppable classification, and congestion seeding for routing that
//! is locked in place. Loose pre-existing routing is released back to the
//! architecture so the router starts from a clean slate.

use crate::error::{RouteResult, RouterError};
use crate::graph::RouterGraph;
use ocular_arch::{BindStrength, NetId, Rect, RoutingContext};

/// Router-side record of one net.
#[derive(Debug, Clone)]
pub struct NetRecord {
    /// Architecture net handle.
    pub net: NetId,
    /// Tight bounding box covering the driver and all sinks.
    pub bb: Rect,
    /// Dense index of the driver wire, if the net has a driver.
    pub source: Option<u32>,
    /// Dense indices of the sink wires.
    pub sinks: Vec<u32>,
    /// The net has no driver and cannot be routed.
    pub undriven: bool,
    /// The net's routing is locked and must not be touched.
    pub fixed_routing: bool,
    /// Failed routing attempts this run; widens the bounding-box slack.
    pub fails: u32,
    /// Wire indices currently bound for this net (empty when unrouted).
    pub bound_wires: Vec<u32>,
    /// Edge indices currently bound for this net.
    pub bound_edges: Vec<u32>,
}

impl NetRecord {
    /// Returns the sink count used for criticality ordering.
    pub fn fanout(&self) -> usize {
        self.sinks.len()
    }

    /// Returns whether the driver should attempt to route this net.
    pub fn routable(&self) -> bool {
        !self.undriven && !self.fixed_routing && !self.sinks.is_empty()
    }
}

/// All imported nets, in context enumeration order.
#[derive(Debug)]
pub struct ImportedNets {
    /// One record per net.
    pub records: Vec<NetRecord>,
}

/// Imports nets from the context, seeding `bound_count` for locked routing.
///
/// # Errors
///
/// Returns [`RouterError::PartialLockedRoute`] if a locked net is missing
/// the wire expected at one of its sinks, and
/// [`RouterError::ConflictingFixedRouting`] if two locked nets claim the
/// same wire.
pub fn import_nets(
    ctx: &mut dyn RoutingContext,
    graph: &RouterGraph,
    bound_count: &mut [u8],
) -> RouteResult<ImportedNets> {
    let mut records = Vec::new();
    let mut loose_prerouted = Vec::new();

    for net in ctx.nets() {
        let mut record = NetRecord {
            net,
            bb: Rect::inverted(graph.width, graph.height),
            source: None,
            sinks: Vec::new(),
            undriven: false,
            fixed_routing: false,
            fails: 0,
            bound_wires: Vec::new(),
            bound_edges: Vec::new(),
        };

        match ctx.net_driver_wire(net) {
            Some(driver) => {
                let idx = graph.wire_to_index[&driver];
                record.bb.extend(graph.centroid(idx));
                record.source = Some(idx);
            }
            None => record.undriven = true,
        }
        let sink_wires = ctx.net_sink_wires(net);
        for sink in &sink_wires {
            let idx = graph.wire_to_index[sink];
            record.bb.extend(graph.centroid(idx));
            record.sinks.push(idx);
        }

        // Pre-existing routing: either locked in place (seed congestion and
        // leave alone) or loose (rip up and reroute from scratch).
        let bound = ctx.net_bound_wires(net);
        if !bound.is_empty() {
            let mut invalid_route = false;
            for sink in &sink_wires {
                if !bound.iter().any(|&(w, _)| w == *sink) {
                    invalid_route = true;
                }
            }
            if bound.iter().any(|&(_, s)| s > BindStrength::Strong) {
                record.fixed_routing = true;
            }
            if record.fixed_routing {
                if invalid_route {
                    return Err(RouterError::PartialLockedRoute {
                        net: ctx.net_name(net).to_string(),
                    });
                }
                for &(wire, _) in &bound {
                    let idx = graph.wire_to_index[&wire];
                    if bound_count[idx as usize] != 0 {
                        return Err(RouterError::ConflictingFixedRouting {
                            net: ctx.net_name(net).to_string(),
                            wire: idx,
                        });
                    }
                    bound_count[idx as usize] += 1;
                }
            } else {
                loose_prerouted.push(net);
            }
        }
        records.push(record);
    }

    for net in loose_prerouted {
        log::debug!("ripping up loose pre-routing on net '{}'", ctx.net_name(net));
        ctx.ripup_net(net);
    }

    let routable = records.iter().filter(|r| r.routable()).count();
    log::info!(
        "imported {} nets ({} routable, {} fixed, {} undriven)",
        records.len(),
        routable,
        records.iter().filter(|r| r.fixed_routing).count(),
        records.iter().filter(|r| r.undriven).count()
    );
    Ok(ImportedNets { records })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RouterGraph;
    use ocular_arch::{Delay, FabricModel, Loc};

    fn line_fabric() -> (FabricModel, Vec<ocular_arch::WireId>) {
        let mut fabric = FabricModel::new(4, 1);
        let mut wires = Vec::new();
        for x in 0..4 {
            wires.push(fabric.add_wire(&format!("w{x}"), Loc::new(x, 0)).unwrap());
        }
        for x in 0..3 {
            fabric.add_pip(wires[x], wires[x + 1], Delay::from_ns(0.1));
        }
        (fabric, wires)
    }

    #[test]
    fn bounding_box_covers_driver_and_sinks() {
        let (mut fabric, wires) = line_fabric();
        fabric.add_net("n", Some(wires[1]), vec![wires[3]]);
        let graph = RouterGraph::build(&fabric).unwrap();
        let mut bound = vec![0u8; graph.num_wires()];
        let nets = import_nets(&mut fabric, &graph, &mut bound).unwrap();
        assert_eq!(nets.records[0].bb, Rect::new(1, 0, 3, 0));
        assert!(nets.records[0].routable());
    }

    #[test]
    fn undriven_net_flagged() {
        let (mut fabric, wires) = line_fabric();
        fabric.add_net("floating", None, vec![wires[2]]);
        let graph = RouterGraph::build(&fabric).unwrap();
        let mut bound = vec![0u8; graph.num_wires()];
        let nets = import_nets(&mut fabric, &graph, &mut bound).unwrap();
        assert!(nets.records[0].undriven);
        assert!(!nets.records[0].routable());
    }

    #[test]
    fn fixed_routing_seeds_congestion() {
        use ocular_arch::RoutingContext;
        let (mut fabric, wires) = line_fabric();
        let n = fabric.add_net("gclk", Some(wires[0]), vec![wires[2]]);
        for &w in &wires[0..3] {
            fabric.bind_wire(w, n, BindStrength::Fixed);
        }
        let graph = RouterGraph::build(&fabric).unwrap();
        let mut bound = vec![0u8; graph.num_wires()];
        let nets = import_nets(&mut fabric, &graph, &mut bound).unwrap();
        assert!(nets.records[0].fixed_routing);
        assert_eq!(&bound[0..3], &[1, 1, 1]);
        assert_eq!(bound[3], 0);
    }

    #[test]
    fn loose_prerouting_ripped_up() {
        use ocular_arch::RoutingContext;
        let (mut fabric, wires) = line_fabric();
        let n = fabric.add_net("n", Some(wires[0]), vec![wires[2]]);
        for &w in &wires[0..3] {
            fabric.bind_wire(w, n, BindStrength::Weak);
        }
        let graph = RouterGraph::build(&fabric).unwrap();
        let mut bound = vec![0u8; graph.num_wires()];
        let nets = import_nets(&mut fabric, &graph, &mut bound).unwrap();
        assert!(!nets.records[0].fixed_routing);
        assert!(fabric.net_bound_wires(n).is_empty());
        assert_eq!(bound, vec![0, 0, 0, 0]);
    }

    #[test]
    fn locked_and_incomplete_is_fatal() {
        use ocular_arch::RoutingContext;
        let (mut fabric, wires) = line_fabric();
        let n = fabric.add_net("gclk", Some(wires[0]), vec![wires[3]]);
        // Locked wires that do not include the sink wire.
        fabric.bind_wire(wires[0], n, BindStrength::Fixed);
        fabric.bind_wire(wires[1], n, BindStrength::Fixed);
        let graph = RouterGraph::build(&fabric).unwrap();
        let mut bound = vec![0u8; graph.num_wires()];
        let err = import_nets(&mut fabric, &graph, &mut bound);
        assert!(matches!(err, Err(RouterError::PartialLockedRoute { .. })));
    }

    #[test]
    fn overlapping_fixed_nets_are_fatal() {
        use ocular_arch::RoutingContext;
        let (mut fabric, wires) = line_fabric();
        let n0 = fabric.add_net("gclk0", Some(wires[0]), vec![wires[1]]);
        let n1 = fabric.add_net("gclk1", Some(wires[0]), vec![wires[1]]);
        for n in [n0, n1] {
            fabric.bind_wire(wires[0], n, BindStrength::Fixed);
            fabric.bind_wire(wires[1], n, BindStrength::Fixed);
        }
        let graph = RouterGraph::build(&fabric).unwrap();
        let mut bound = vec![0u8; graph.num_wires()];
        let err = import_nets(&mut fabric, &graph, &mut bound);
        assert!(matches!(
            err,
            Err(RouterError::ConflictingFixedRouting { .. })
        ));
    }

    #[test]
    fn zero_sink_net_not_routable() {
        let (mut fabric, wires) = line_fabric();
        fabric.add_net("dangling", Some(wires[0]), vec![]);
        let graph = RouterGraph::build(&fabric).unwrap();
        let mut bound = vec![0u8; graph.num_wires()];
        let nets = import_nets(&mut fabric, &graph, &mut bound).unwrap();
        assert!(!nets.records[0].routable());
    }
}
