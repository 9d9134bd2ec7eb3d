//! Negotiated-congestion routing driver.
//!
//! The host-side outer loop: each pass admits non-overlapping nets into the
//! device slots, expands them concurrently, traces back and binds the
//! resulting trees, then scans for overused wires. Overuse raises the
//! history cost of the edges feeding those wires and rips up every loose
//! net crossing them; the congestion multiplier escalates pass over pass
//! until the solution is conflict-free or the pass limit is reached.

use crate::admission::AdmissionController;
use crate::config::RouterConfig;
use crate::error::RouteResult;
use crate::graph::{RouterGraph, INF_COST, NO_EDGE};
use crate::kernel::{expand_net, teardown_slot, ExpansionOutcome, KernelArgs};
use crate::nets::{ImportedNets, NetRecord};
use crate::pool::{DevicePool, NetConfig};
use crate::serial::{expand_serial, SerialExpansion};
use ocular_arch::{BindStrength, RoutingContext};
use ocular_compute::Dispatcher;
use rayon::prelude::*;
use std::collections::HashSet;

/// Upper bound on the escalating congestion multiplier, keeping summed
/// path costs well below the `INF_COST` sentinel.
const MAX_CONG_COST: f32 = 1.0e6;

/// One admitted net, ready for expansion.
#[derive(Debug, Clone, Copy)]
struct Admitted {
    slot: usize,
    net_idx: usize,
    cfg: NetConfig,
    source: u32,
}

/// Runs the negotiation loop until every net routes without overuse, or the
/// pass limit is hit. Returns `Ok(true)` on a conflict-free solution.
pub(crate) fn run_negotiation(
    ctx: &mut dyn RoutingContext,
    graph: &mut RouterGraph,
    nets: &mut ImportedNets,
    bound_count: &mut [u8],
    config: &RouterConfig,
) -> RouteResult<bool> {
    let mut pool = DevicePool::new(config, graph.num_wires());
    let mut admission =
        AdmissionController::new(graph.width, graph.height, config.max_nets_in_flight as usize);
    let dispatcher = Dispatcher::new(config.workgroup_size);
    let mut curr_cong_cost = config.initial_cong_cost;

    let mut to_route: Vec<usize> = nets
        .records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.routable())
        .map(|(i, _)| i)
        .collect();

    for pass in 1..=config.max_passes {
        order_by_criticality(&mut to_route, &nets.records);
        let mut pending = std::mem::take(&mut to_route);
        let mut failed: Vec<usize> = Vec::new();
        let mut routed_this_pass = 0usize;

        while !pending.is_empty() {
            // Fill free slots first-fit from the criticality order; nets
            // whose (slack-expanded) box collides with an in-flight one
            // wait for a later batch.
            let mut batch: Vec<Admitted> = Vec::new();
            let mut i = 0;
            while i < pending.len() && pool.free_slot().is_some() {
                let net_idx = pending[i];
                let rec = &nets.records[net_idx];
                let Some(source) = rec.source else {
                    pending.remove(i);
                    continue;
                };
                let margin = bb_margin(config, rec);
                let ebb = rec.bb.expand(margin, graph.width, graph.height);
                let slot = match pool.free_slot() {
                    Some(s) => s,
                    None => break,
                };
                if !admission.try_admit(slot, ebb) {
                    i += 1;
                    continue;
                }
                pool.occupy(slot, net_idx);
                let groups = pool.slot_groups(slot);
                batch.push(Admitted {
                    slot,
                    net_idx,
                    cfg: NetConfig {
                        bb: ebb,
                        near_queue_size: config.near_queue_len,
                        far_queue_size: config.far_queue_len,
                        dirty_queue_size: config.dirty_queue_len,
                        net_start: groups.start,
                        net_end: groups.end,
                        curr_cong_cost,
                        near_far_thresh: config.initial_near_far_thresh,
                        group_nodes: config.near_queue_len,
                    },
                    source,
                });
                pending.remove(i);
            }

            // Snapshot of the congestion counters for this launch; the live
            // array is only mutated once the batch has completed.
            let bound_view: Vec<u8> = bound_count.to_vec();
            let graph_ref: &RouterGraph = graph;
            let pool_ref: &DevicePool = &pool;

            let outcomes: Vec<ExpansionOutcome> = batch
                .par_iter()
                .map(|adm| {
                    let args = KernelArgs {
                        graph: graph_ref,
                        pool: pool_ref,
                        bound_count: &bound_view,
                        dispatcher,
                        config,
                    };
                    expand_net(&args, &adm.cfg, adm.source)
                })
                .collect();

            for (adm, outcome) in batch.iter().zip(outcomes) {
                let args = KernelArgs {
                    graph: graph_ref,
                    pool: pool_ref,
                    bound_count: &bound_view,
                    dispatcher,
                    config,
                };
                let tree = match outcome {
                    ExpansionOutcome::Drained { rounds } => {
                        log::debug!(
                            "net '{}' drained in {rounds} rounds",
                            ctx.net_name(nets.records[adm.net_idx].net)
                        );
                        let tree =
                            trace_device_tree(graph_ref, pool_ref, adm, &nets.records[adm.net_idx]);
                        teardown_slot(&args, &adm.cfg, false);
                        tree
                    }
                    ExpansionOutcome::RoundLimit => {
                        log::warn!(
                            "net '{}' hit the {}-round cap; retrying next pass",
                            ctx.net_name(nets.records[adm.net_idx].net),
                            config.max_rounds_per_net
                        );
                        teardown_slot(&args, &adm.cfg, false);
                        None
                    }
                    ExpansionOutcome::Overflow { queue } => {
                        log::warn!(
                            "device {queue} queue overflow on net '{}'; falling back to serial expansion",
                            ctx.net_name(nets.records[adm.net_idx].net)
                        );
                        teardown_slot(&args, &adm.cfg, queue == "dirty");
                        let exp = expand_serial(
                            graph_ref,
                            &adm.cfg,
                            &bound_view,
                            config.wire_capacity,
                            config.present_slope,
                            adm.source,
                        );
                        trace_serial_tree(graph_ref, &exp, adm, &nets.records[adm.net_idx])
                    }
                };

                let rec = &mut nets.records[adm.net_idx];
                match tree {
                    Some((wires, edges)) => {
                        bind_net(ctx, graph_ref, rec, bound_count, wires, edges);
                        routed_this_pass += 1;
                    }
                    None => {
                        rec.fails += 1;
                        failed.push(adm.net_idx);
                    }
                }
            }

            for adm in &batch {
                admission.release(adm.slot);
                pool.vacate(adm.slot);
            }
        }

        // Congestion accounting: raise history on edges into overused wires
        // and rip up every loose net that crosses one.
        let cap = config.wire_capacity;
        let overused: Vec<bool> = bound_count.iter().map(|&c| c > cap).collect();
        let overused_count = overused.iter().filter(|&&o| o).count();

        let mut ripped: Vec<usize> = Vec::new();
        if overused_count > 0 {
            for e in 0..graph.num_edges() {
                let v = graph.edge_dst.host()[e] as usize;
                let over = bound_count[v].saturating_sub(cap);
                if over > 0 {
                    let bump = (config.history_factor * over as f32).round() as i32;
                    let cell = &mut graph.edge_cost.host_mut()[e];
                    *cell = cell.saturating_add(bump);
                }
            }
            graph.edge_cost.upload();

            for (idx, rec) in nets.records.iter_mut().enumerate() {
                if rec.fixed_routing || rec.bound_wires.is_empty() {
                    continue;
                }
                if rec.bound_wires.iter().any(|&w| overused[w as usize]) {
                    ctx.ripup_net(rec.net);
                    for &w in &rec.bound_wires {
                        bound_count[w as usize] = bound_count[w as usize].saturating_sub(1);
                    }
                    rec.bound_wires.clear();
                    rec.bound_edges.clear();
                    ripped.push(idx);
                }
            }
        }

        log::info!(
            "pass {pass}: routed {routed_this_pass}, failed {}, overused wires {overused_count}, ripped {}",
            failed.len(),
            ripped.len()
        );

        if overused_count == 0 && failed.is_empty() {
            return Ok(true);
        }

        to_route = ripped;
        to_route.extend(failed);
        if pass >= 2 {
            curr_cong_cost = (curr_cong_cost * config.cong_cost_multiplier).min(MAX_CONG_COST);
        }
    }

    log::warn!(
        "routing did not converge after {} passes ({} nets still unresolved)",
        config.max_passes,
        to_route.len()
    );
    Ok(false)
}

/// Bounding-box slack for a net, widening with each failed attempt.
fn bb_margin(config: &RouterConfig, rec: &NetRecord) -> u16 {
    let extra = (config.bb_margin_step as u32).saturating_mul(rec.fails);
    (config.bb_margin as u32).saturating_add(extra).min(u16::MAX as u32) as u16
}

/// Sorts net indices by descending criticality: fanout first, then smaller
/// bounding boxes (which pack better), then net index for stability.
fn order_by_criticality(order: &mut [usize], records: &[NetRecord]) {
    order.sort_by(|&a, &b| {
        let ra = &records[a];
        let rb = &records[b];
        rb.fanout()
            .cmp(&ra.fanout())
            .then_with(|| ra.bb.perimeter().cmp(&rb.bb.perimeter()))
            .then_with(|| a.cmp(&b))
    });
}

/// Traces the routed tree for a net out of the device cost/uphill state.
fn trace_device_tree(
    graph: &RouterGraph,
    pool: &DevicePool,
    adm: &Admitted,
    rec: &NetRecord,
) -> Option<(Vec<u32>, Vec<u32>)> {
    // The kernel has completed, so these loads see the slot's final state.
    let cost_of = |w: u32| pool.current_cost.load(w as usize);
    let uphill_of = |w: u32| pool.uphill_edge.load(w as usize);
    collect_tree(graph, adm.source, &rec.sinks, cost_of, uphill_of)
}

/// Traces the routed tree out of a serial fallback expansion.
fn trace_serial_tree(
    graph: &RouterGraph,
    exp: &SerialExpansion,
    adm: &Admitted,
    rec: &NetRecord,
) -> Option<(Vec<u32>, Vec<u32>)> {
    let cost_of = |w: u32| exp.cost(w);
    let uphill_of = |w: u32| exp.uphill(w).unwrap_or(NO_EDGE);
    collect_tree(graph, adm.source, &rec.sinks, cost_of, uphill_of)
}

/// Walks each sink up the uphill-edge chain until it meets the tree built
/// so far, collecting the union of wires and edges. Returns `None` if any
/// sink is unreached or a chain fails to terminate.
fn collect_tree(
    graph: &RouterGraph,
    source: u32,
    sinks: &[u32],
    cost_of: impl Fn(u32) -> i32,
    uphill_of: impl Fn(u32) -> u32,
) -> Option<(Vec<u32>, Vec<u32>)> {
    let mut wires = vec![source];
    let mut in_tree: HashSet<u32> = HashSet::new();
    in_tree.insert(source);
    let mut edges = Vec::new();

    for &sink in sinks {
        if cost_of(sink) >= INF_COST {
            return None;
        }
        let mut path = Vec::new();
        let mut w = sink;
        let mut steps = 0usize;
        while !in_tree.contains(&w) {
            let e = uphill_of(w);
            if e == NO_EDGE {
                return None;
            }
            debug_assert_eq!(graph.edge_dst.host()[e as usize], w);
            path.push((w, e));
            w = graph.edge_src(e);
            steps += 1;
            if steps > graph.num_wires() {
                // A stale predecessor chain failed to reach the tree.
                return None;
            }
        }
        for (wire, edge) in path {
            in_tree.insert(wire);
            wires.push(wire);
            edges.push(edge);
        }
    }
    Some((wires, edges))
}

/// Commits a routed tree: binds the PIPs and wires to the net and bumps the
/// per-wire congestion counters.
fn bind_net(
    ctx: &mut dyn RoutingContext,
    graph: &RouterGraph,
    rec: &mut NetRecord,
    bound_count: &mut [u8],
    wires: Vec<u32>,
    edges: Vec<u32>,
) {
    for &w in &wires {
        ctx.bind_wire(graph.wire_handles[w as usize], rec.net, BindStrength::Weak);
        bound_count[w as usize] = bound_count[w as usize].saturating_add(1);
    }
    for &e in &edges {
        ctx.bind_pip(graph.edge_pip[e as usize], rec.net, BindStrength::Weak);
    }
    rec.bound_wires = wires;
    rec.bound_edges = edges;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocular_arch::{NetId, Rect};

    fn record(bb: Rect, sinks: usize, fails: u32) -> NetRecord {
        NetRecord {
            net: NetId::from_raw(0),
            bb,
            source: Some(0),
            sinks: vec![0; sinks],
            undriven: false,
            fixed_routing: false,
            fails,
            bound_wires: Vec::new(),
            bound_edges: Vec::new(),
        }
    }

    #[test]
    fn criticality_orders_by_fanout_then_box() {
        let records = vec![
            record(Rect::new(0, 0, 4, 4), 1, 0),
            record(Rect::new(0, 0, 1, 1), 1, 0),
            record(Rect::new(0, 0, 1, 1), 3, 0),
        ];
        let mut order = vec![0, 1, 2];
        order_by_criticality(&mut order, &records);
        // Highest fanout first, then the smaller box, then the larger.
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn criticality_tie_breaks_by_index() {
        let records = vec![
            record(Rect::new(0, 0, 2, 2), 1, 0),
            record(Rect::new(0, 0, 2, 2), 1, 0),
        ];
        let mut order = vec![1, 0];
        order_by_criticality(&mut order, &records);
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn margin_widens_with_failures() {
        let config = RouterConfig::default();
        let fresh = record(Rect::new(0, 0, 1, 1), 1, 0);
        let tried = record(Rect::new(0, 0, 1, 1), 1, 3);
        assert_eq!(bb_margin(&config, &fresh), 1);
        assert_eq!(bb_margin(&config, &tried), 1 + 3 * 2);
    }

    #[test]
    fn margin_saturates() {
        let config = RouterConfig::default();
        let hopeless = record(Rect::new(0, 0, 1, 1), 1, u32::MAX);
        assert_eq!(bb_margin(&config, &hopeless), u16::MAX);
    }
}
