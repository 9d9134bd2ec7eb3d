//! Parallel wavefront expansion for one in-flight net.
//!
//! A work-efficient SSSP variant over the CSR graph: the frontier is split
//! into a near queue (below a moving cost threshold, processed every round)
//! and a far queue (deferred until the near frontier drains, then promoted
//! with a raised threshold). Each round the host prefix-sums the
//! per-workgroup near counts and launches one work-item per queued node;
//! work-items relax their node's outgoing edges with compare-and-swap cost
//! updates, record the uphill edge on improvement, and append
//! first-touched wires to the dirtied list so teardown can restore the
//! shared cost cells to infinity.

use crate::config::RouterConfig;
use crate::graph::{RouterGraph, INF_COST, NO_EDGE};
use crate::pool::{DevicePool, NetConfig, OVERFLOW_DIRTY, OVERFLOW_FAR, OVERFLOW_NEAR};
use ocular_arch::Loc;
use ocular_compute::{owning_group, prefix_sum_in_place, Dispatcher};

/// How one net's expansion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionOutcome {
    /// Both frontiers drained; every reachable wire in the clip box has its
    /// final cost.
    Drained {
        /// Relaxation rounds executed.
        rounds: u32,
    },
    /// The per-net round cap was hit before the frontier drained.
    RoundLimit,
    /// A device queue would have exceeded its capacity.
    Overflow {
        /// Which queue overflowed.
        queue: &'static str,
    },
}

/// Shared inputs for kernel launches.
#[derive(Debug, Clone, Copy)]
pub struct KernelArgs<'a> {
    /// The CSR routing graph.
    pub graph: &'a RouterGraph,
    /// Device-resident routing state.
    pub pool: &'a DevicePool,
    /// Per-wire bound-net counts (read-only during launches).
    pub bound_count: &'a [u8],
    /// The work-item executor.
    pub dispatcher: Dispatcher,
    /// Router tuning parameters.
    pub config: &'a RouterConfig,
}

/// Congestion penalty for stepping onto a wire that would then carry
/// `occupancy` nets.
fn congestion_penalty(curr_cong_cost: f32, capacity: u8, slope: f32, occupancy: u32) -> i32 {
    let present = if occupancy <= capacity as u32 {
        1.0
    } else {
        1.0 + slope * (occupancy - capacity as u32) as f32
    };
    (curr_cong_cost * present).round() as i32
}

/// Expands `source`'s shortest-path tree within the slot described by `cfg`.
///
/// The caller seeds nothing: this routine stores the zero cost at the
/// source, runs near rounds and far promotions until the frontier drains,
/// and leaves `current_cost`/`uphill_edge` for the caller to trace back.
/// Teardown is the caller's responsibility in every outcome.
pub fn expand_net(args: &KernelArgs, cfg: &NetConfig, source: u32) -> ExpansionOutcome {
    let pool = args.pool;
    let near_stride = cfg.group_nodes as usize;
    let far_stride = cfg.far_queue_size as usize;
    let dirty_stride = cfg.dirty_queue_size as usize;

    // Seed the source at cost zero.
    let sg = cfg.owning_group(source) as usize;
    pool.current_cost.store(source as usize, 0);
    pool.near_queue_a.store(sg * near_stride, source);
    pool.near_count_a.store(sg, 1);
    pool.dirtied_nodes.store(sg * dirty_stride, source);
    pool.dirtied_count.store(sg, 1);

    let mut thresh = cfg.near_far_thresh;
    let mut cur_is_a = true;

    for rounds in 0..args.config.max_rounds_per_net {
        let (cur_queue, cur_count, next_queue, next_count) = if cur_is_a {
            (
                &pool.near_queue_a,
                &pool.near_count_a,
                &pool.near_queue_b,
                &pool.near_count_b,
            )
        } else {
            (
                &pool.near_queue_b,
                &pool.near_count_b,
                &pool.near_queue_a,
                &pool.near_count_a,
            )
        };

        // Host-side scan of this net's workgroup counts; work-items binary
        // search it to find their node.
        let mut prefix: Vec<u32> = cfg
            .groups()
            .map(|g| cur_count.load(g as usize))
            .collect();
        let total = prefix_sum_in_place(&mut prefix);

        if total == 0 {
            // Near frontier drained: promote the far queue past the
            // threshold, or finish if it is empty too.
            let far_total: u32 = cfg.groups().map(|g| pool.far_count.load(g as usize)).sum();
            if far_total == 0 {
                return ExpansionOutcome::Drained { rounds };
            }
            let mut min_far = i32::MAX;
            for g in cfg.groups() {
                let g = g as usize;
                let n = pool.far_count.load(g).min(cfg.far_queue_size);
                if n > cfg.near_queue_size {
                    return ExpansionOutcome::Overflow { queue: "near" };
                }
                for i in 0..n as usize {
                    let v = pool.far_queue.load(g * far_stride + i);
                    min_far = min_far.min(pool.current_cost.load(v as usize));
                }
                for i in 0..n as usize {
                    let v = pool.far_queue.load(g * far_stride + i);
                    cur_queue.store(g * near_stride + i, v);
                }
                cur_count.store(g, n);
                pool.far_count.store(g, 0);
            }
            let excess = (min_far - thresh).max(1);
            thresh = (thresh + (excess as f32 * args.config.thresh_step_factor) as i32)
                .max(min_far.saturating_add(1));
            continue;
        }

        let graph = args.graph;
        let wire_x = graph.wire_x.device();
        let wire_y = graph.wire_y.device();
        let adj = graph.adj_offset.device();
        let edge_dst = graph.edge_dst.device();
        let edge_cost = graph.edge_cost.device();
        let bound = args.bound_count;
        let capacity = args.config.wire_capacity;
        let slope = args.config.present_slope;
        let prefix = &prefix;

        let global = args.dispatcher.global_size_for(total);
        args.dispatcher.dispatch(global, |item| {
            if item.global_id >= total {
                return;
            }
            let (local_g, local_i) = owning_group(prefix, item.global_id);
            let g = cfg.net_start as usize + local_g;
            let u = cur_queue.load(g * near_stride + local_i as usize) as usize;
            let cost_u = pool.current_cost.load(u);

            for e in adj[u]..adj[u + 1] {
                let v = edge_dst[e as usize] as usize;
                if !cfg.bb.contains(Loc::new(wire_x[v], wire_y[v])) {
                    continue;
                }
                let occupancy = bound[v] as u32 + 1;
                let penalty = congestion_penalty(cfg.curr_cong_cost, capacity, slope, occupancy);
                let tentative = cost_u
                    .saturating_add(edge_cost[e as usize])
                    .saturating_add(penalty);
                // Costs at or above the sentinel are unreachable by definition.
                if tentative >= INF_COST {
                    continue;
                }

                let mut observed = pool.current_cost.load(v);
                loop {
                    if tentative > observed {
                        break;
                    }
                    if tentative == observed {
                        // Equal cost: the lower edge index wins, keeping
                        // results schedule-independent.
                        pool.uphill_edge.fetch_min(v, e);
                        break;
                    }
                    match pool.current_cost.compare_exchange(v, observed, tentative) {
                        Ok(prev) => {
                            // uphill_edge is only read after the winning CAS
                            // in this same flow; a raced store is corrected
                            // by a later improvement or dropped.
                            pool.uphill_edge.store(v, e);
                            if prev == INF_COST {
                                let dg = cfg.owning_group(v as u32) as usize;
                                let di = pool.dirtied_count.fetch_add(dg, 1);
                                if di < cfg.dirty_queue_size {
                                    pool.dirtied_nodes
                                        .store(dg * dirty_stride + di as usize, v as u32);
                                } else {
                                    pool.overflow_flags.fetch_or(dg, OVERFLOW_DIRTY);
                                }
                            }
                            let qg = cfg.owning_group(v as u32) as usize;
                            if tentative < thresh {
                                let qi = next_count.fetch_add(qg, 1);
                                if qi < cfg.near_queue_size {
                                    next_queue.store(qg * near_stride + qi as usize, v as u32);
                                } else {
                                    pool.overflow_flags.fetch_or(qg, OVERFLOW_NEAR);
                                }
                            } else {
                                let qi = pool.far_count.fetch_add(qg, 1);
                                if qi < cfg.far_queue_size {
                                    pool.far_queue.store(qg * far_stride + qi as usize, v as u32);
                                } else {
                                    pool.overflow_flags.fetch_or(qg, OVERFLOW_FAR);
                                }
                            }
                            break;
                        }
                        Err(now) => observed = now,
                    }
                }
            }
        });

        for g in cfg.groups() {
            let flags = pool.overflow_flags.load(g as usize);
            if flags != 0 {
                let queue = if flags & OVERFLOW_NEAR != 0 {
                    "near"
                } else if flags & OVERFLOW_FAR != 0 {
                    "far"
                } else {
                    "dirty"
                };
                return ExpansionOutcome::Overflow { queue };
            }
        }

        // The current queue is consumed; swap read/write roles.
        for g in cfg.groups() {
            cur_count.store(g as usize, 0);
        }
        cur_is_a = !cur_is_a;
    }
    ExpansionOutcome::RoundLimit
}

/// Restores the slot's share of the device state after an expansion.
///
/// Every wire on the dirtied list gets its cost reset to infinity and its
/// uphill edge cleared; queue counters and overflow flags are zeroed. When
/// the dirtied list itself overflowed (`full_reset`), the list is
/// incomplete, so every wire inside the clip box is swept instead.
pub fn teardown_slot(args: &KernelArgs, cfg: &NetConfig, full_reset: bool) {
    let pool = args.pool;
    let dirty_stride = cfg.dirty_queue_size as usize;

    if full_reset {
        let wire_x = args.graph.wire_x.device();
        let wire_y = args.graph.wire_y.device();
        for w in 0..args.graph.num_wires() {
            if cfg.bb.contains(Loc::new(wire_x[w], wire_y[w])) {
                pool.current_cost.store(w, INF_COST);
                pool.uphill_edge.store(w, NO_EDGE);
            }
        }
    } else {
        for g in cfg.groups() {
            let g = g as usize;
            let n = pool.dirtied_count.load(g).min(cfg.dirty_queue_size);
            for i in 0..n as usize {
                let w = pool.dirtied_nodes.load(g * dirty_stride + i) as usize;
                pool.current_cost.store(w, INF_COST);
                pool.uphill_edge.store(w, NO_EDGE);
            }
        }
    }

    for g in cfg.groups() {
        let g = g as usize;
        pool.near_count_a.store(g, 0);
        pool.near_count_b.store(g, 0);
        pool.far_count.store(g, 0);
        pool.dirtied_count.store(g, 0);
        pool.overflow_flags.store(g, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RouterGraph;
    use crate::pool::DevicePool;
    use ocular_arch::{Delay, FabricModel, Loc, PipId, Rect, WireId};

    fn test_config() -> RouterConfig {
        RouterConfig {
            num_workgroups: 4,
            workgroup_size: 8,
            near_queue_len: 256,
            far_queue_len: 512,
            dirty_queue_len: 512,
            max_nets_in_flight: 2,
            ..RouterConfig::default()
        }
    }

    fn net_config(config: &RouterConfig, bb: Rect) -> NetConfig {
        NetConfig {
            bb,
            near_queue_size: config.near_queue_len,
            far_queue_size: config.far_queue_len,
            dirty_queue_size: config.dirty_queue_len,
            net_start: 0,
            net_end: config.groups_per_slot(),
            curr_cong_cost: config.initial_cong_cost,
            near_far_thresh: config.initial_near_far_thresh,
            group_nodes: config.near_queue_len,
        }
    }

    struct Setup {
        graph: RouterGraph,
        pool: DevicePool,
        bound: Vec<u8>,
        config: RouterConfig,
    }

    fn setup(fabric: &FabricModel) -> Setup {
        let config = test_config();
        let graph = RouterGraph::build(fabric).unwrap();
        let pool = DevicePool::new(&config, graph.num_wires());
        let bound = vec![0u8; graph.num_wires()];
        Setup {
            graph,
            pool,
            bound,
            config,
        }
    }

    fn args(s: &Setup) -> KernelArgs<'_> {
        KernelArgs {
            graph: &s.graph,
            pool: &s.pool,
            bound_count: &s.bound,
            dispatcher: Dispatcher::new(s.config.workgroup_size),
            config: &s.config,
        }
    }

    fn line_fabric(n: u16) -> (FabricModel, Vec<WireId>) {
        let mut fabric = FabricModel::new(n, 1);
        let mut wires = Vec::new();
        for x in 0..n as i16 {
            wires.push(fabric.add_wire(&format!("w{x}"), Loc::new(x, 0)).unwrap());
        }
        for x in 0..(n - 1) as usize {
            fabric.add_pip(wires[x], wires[x + 1], Delay::from_ns(0.1));
        }
        (fabric, wires)
    }

    #[test]
    fn expands_a_line() {
        let (fabric, _) = line_fabric(4);
        let s = setup(&fabric);
        let a = args(&s);
        let cfg = net_config(&s.config, Rect::new(0, 0, 3, 0));

        let outcome = expand_net(&a, &cfg, 0);
        assert!(matches!(outcome, ExpansionOutcome::Drained { .. }));

        // Each hop costs 100 ps base plus the 1000 ps congestion term.
        let costs = s.pool.current_cost.snapshot();
        assert_eq!(costs[0], 0);
        assert_eq!(costs[1], 1100);
        assert_eq!(costs[2], 2200);
        assert_eq!(costs[3], 3300);
    }

    #[test]
    fn predecessor_consistency() {
        let fabric = FabricModel::mesh(5, 5);
        let s = setup(&fabric);
        let a = args(&s);
        let cfg = net_config(&s.config, Rect::new(0, 0, 4, 4));

        let outcome = expand_net(&a, &cfg, 0);
        assert!(matches!(outcome, ExpansionOutcome::Drained { .. }));

        let costs = s.pool.current_cost.snapshot();
        let uphill = s.pool.uphill_edge.snapshot();
        for v in 0..s.graph.num_wires() {
            if costs[v] >= INF_COST || v == 0 {
                continue;
            }
            let e = uphill[v];
            assert_ne!(e, NO_EDGE, "reached wire {v} has no uphill edge");
            assert_eq!(s.graph.edge_dst.host()[e as usize] as usize, v);
            let src = s.graph.edge_src(e) as usize;
            assert!(
                costs[src] + s.graph.edge_cost.host()[e as usize] <= costs[v],
                "uphill edge of wire {v} is not on an improving path"
            );
        }
    }

    #[test]
    fn bounding_box_clips_expansion() {
        let (fabric, _) = line_fabric(6);
        let s = setup(&fabric);
        let a = args(&s);
        // Clip to the first three tiles.
        let cfg = net_config(&s.config, Rect::new(0, 0, 2, 0));

        expand_net(&a, &cfg, 0);
        let costs = s.pool.current_cost.snapshot();
        assert!(costs[2] < INF_COST);
        assert_eq!(costs[3], INF_COST);
        assert_eq!(costs[5], INF_COST);
    }

    #[test]
    fn far_queue_promotion_still_finds_costs() {
        let (fabric, _) = line_fabric(8);
        let s = setup(&fabric);
        let a = args(&s);
        // Threshold below one hop: every push defers to the far queue and
        // each round promotes exactly one frontier layer.
        let mut cfg = net_config(&s.config, Rect::new(0, 0, 7, 0));
        cfg.near_far_thresh = 1;

        let outcome = expand_net(&a, &cfg, 0);
        assert!(matches!(outcome, ExpansionOutcome::Drained { .. }));
        let costs = s.pool.current_cost.snapshot();
        for (i, &c) in costs.iter().enumerate() {
            assert_eq!(c, 1100 * i as i32);
        }
    }

    /// Builds the detour fabric: a two-hop lower path through `l1` and a
    /// three-hop upper path through `u1`/`u2`, both from `src` to `dst`.
    fn detour_fabric() -> (FabricModel, [WireId; 5], PipId, PipId) {
        let mut fabric = FabricModel::new(4, 2);
        let src = fabric.add_wire("src", Loc::new(0, 0)).unwrap();
        let l1 = fabric.add_wire("l1", Loc::new(1, 0)).unwrap();
        let u1 = fabric.add_wire("u1", Loc::new(1, 1)).unwrap();
        let u2 = fabric.add_wire("u2", Loc::new(2, 1)).unwrap();
        let dst = fabric.add_wire("dst", Loc::new(3, 0)).unwrap();
        let hop = Delay::from_ns(0.1);
        fabric.add_pip(src, l1, hop);
        fabric.add_pip(src, u1, hop);
        let via_lower = fabric.add_pip(l1, dst, hop);
        fabric.add_pip(u1, u2, hop);
        let via_upper = fabric.add_pip(u2, dst, hop);
        (fabric, [src, l1, u1, u2, dst], via_lower, via_upper)
    }

    #[test]
    fn shorter_path_wins_without_congestion() {
        let (fabric, [src, _, _, _, dst], via_lower, _) = detour_fabric();
        let s = setup(&fabric);
        let a = args(&s);
        let cfg = net_config(&s.config, Rect::new(0, 0, 3, 1));

        expand_net(&a, &cfg, src.as_raw());
        let costs = s.pool.current_cost.snapshot();
        let uphill = s.pool.uphill_edge.snapshot();
        assert_eq!(costs[dst.as_raw() as usize], 2200);
        let e = uphill[dst.as_raw() as usize];
        assert_eq!(s.graph.edge_pip[e as usize], via_lower);
    }

    #[test]
    fn congestion_steers_to_free_path() {
        // The short path's middle wire already carries a bound net, so the
        // present-congestion penalty makes the three-hop detour cheaper.
        let (fabric, [src, l1, _, _, dst], _, via_upper) = detour_fabric();
        let mut s = setup(&fabric);
        s.bound[l1.as_raw() as usize] = 1;
        let a = args(&s);
        let cfg = net_config(&s.config, Rect::new(0, 0, 3, 1));

        expand_net(&a, &cfg, src.as_raw());
        let costs = s.pool.current_cost.snapshot();
        let uphill = s.pool.uphill_edge.snapshot();
        // Lower: 100 + 5000 penalty, then one more hop. Upper: three clean hops.
        assert_eq!(costs[dst.as_raw() as usize], 3300);
        let e = uphill[dst.as_raw() as usize];
        assert_eq!(s.graph.edge_pip[e as usize], via_upper);
    }

    #[test]
    fn equal_cost_tie_prefers_lower_edge_index() {
        // Two parallel pips between the same pair of wires: the same
        // work-item relaxes both, and the lower adjacency index must win.
        let mut fabric = FabricModel::new(2, 1);
        let a_wire = fabric.add_wire("a", Loc::new(0, 0)).unwrap();
        let b_wire = fabric.add_wire("b", Loc::new(1, 0)).unwrap();
        let hop = Delay::from_ns(0.1);
        let first = fabric.add_pip(a_wire, b_wire, hop);
        fabric.add_pip(a_wire, b_wire, hop);

        let s = setup(&fabric);
        let a = args(&s);
        let cfg = net_config(&s.config, Rect::new(0, 0, 1, 0));
        expand_net(&a, &cfg, a_wire.as_raw());

        let uphill = s.pool.uphill_edge.snapshot();
        let e = uphill[b_wire.as_raw() as usize];
        assert_eq!(s.graph.edge_pip[e as usize], first);
    }

    #[test]
    fn dirtied_roundtrip_after_teardown() {
        let fabric = FabricModel::mesh(4, 4);
        let s = setup(&fabric);
        let a = args(&s);
        let cfg = net_config(&s.config, Rect::new(0, 0, 3, 3));

        expand_net(&a, &cfg, 5);
        assert!(s
            .pool
            .current_cost
            .snapshot()
            .iter()
            .any(|&c| c < INF_COST));

        teardown_slot(&a, &cfg, false);
        assert!(s
            .pool
            .current_cost
            .snapshot()
            .iter()
            .all(|&c| c == INF_COST));
        assert!(s.pool.uphill_edge.snapshot().iter().all(|&e| e == NO_EDGE));
        assert!(s.pool.dirtied_count.snapshot().iter().all(|&c| c == 0));
        assert!(s.pool.near_count_a.snapshot().iter().all(|&c| c == 0));
        assert!(s.pool.near_count_b.snapshot().iter().all(|&c| c == 0));
        assert!(s.pool.far_count.snapshot().iter().all(|&c| c == 0));
    }

    #[test]
    fn dirty_overflow_detected_and_swept() {
        let fabric = FabricModel::mesh(6, 6);
        let mut config = test_config();
        config.dirty_queue_len = 2;
        let graph = RouterGraph::build(&fabric).unwrap();
        let pool = DevicePool::new(&config, graph.num_wires());
        let bound = vec![0u8; graph.num_wires()];
        let s = Setup {
            graph,
            pool,
            bound,
            config,
        };
        let a = args(&s);
        let cfg = net_config(&s.config, Rect::new(0, 0, 5, 5));

        let outcome = expand_net(&a, &cfg, 0);
        assert!(matches!(outcome, ExpansionOutcome::Overflow { .. }));

        teardown_slot(&a, &cfg, true);
        assert!(s
            .pool
            .current_cost
            .snapshot()
            .iter()
            .all(|&c| c == INF_COST));
    }

    #[test]
    fn round_limit_reported() {
        let (fabric, _) = line_fabric(8);
        let mut config = test_config();
        config.max_rounds_per_net = 2;
        let graph = RouterGraph::build(&fabric).unwrap();
        let pool = DevicePool::new(&config, graph.num_wires());
        let bound = vec![0u8; graph.num_wires()];
        let s = Setup {
            graph,
            pool,
            bound,
            config,
        };
        let a = args(&s);
        let cfg = net_config(&s.config, Rect::new(0, 0, 7, 0));

        let outcome = expand_net(&a, &cfg, 0);
        assert_eq!(outcome, ExpansionOutcome::RoundLimit);
    }

    #[test]
    fn source_equals_sink_is_trivially_drained() {
        let mut fabric = FabricModel::new(1, 1);
        fabric.add_wire("only", Loc::new(0, 0)).unwrap();
        let s = setup(&fabric);
        let a = args(&s);
        let cfg = net_config(&s.config, Rect::new(0, 0, 0, 0));

        let outcome = expand_net(&a, &cfg, 0);
        assert!(matches!(outcome, ExpansionOutcome::Drained { rounds: 1 }));
        assert_eq!(s.pool.current_cost.load(0), 0);
    }
}
