//! Level-ordered graph delay calculation with incremental dirty sets.

use crate::delay_calc::{ArcDelayCalc, DriverLoads};
use chronos_common::{fuzzy_equal, ChronosResult, MinMax, RiseFall};
use chronos_diagnostics::DiagnosticSink;
use chronos_graph::{levelize::vertices_by_level, BfsIndex, EdgeId, Graph, VertexId};
use chronos_netlist::{Library, NetId, Network, Parasitics, PinId, TimingArcSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One delay-calculation analysis point: a dense index plus the min/max
/// pole that governs merging at that point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisPt {
    /// Dense index into the graph's side arrays.
    pub index: usize,
    /// The merge pole.
    pub min_max: MinMax,
}

/// Read-only collaborators handed to the delay traversal.
pub struct DelayContext<'a> {
    /// The linked network.
    pub network: &'a Network,
    /// The liberty library.
    pub library: &'a Library,
    /// Per-net parasitics.
    pub parasitics: &'a Parasitics,
    /// Analysis points, in index order.
    pub aps: &'a [AnalysisPt],
    /// Diagnostic sink.
    pub sink: &'a DiagnosticSink,
}

// Writes computed by one driver, applied at the level barrier.
struct DriverResult {
    arc_delay_writes: Vec<(EdgeId, usize, usize, f64)>,
    slew_writes: Vec<(VertexId, RiseFall, usize, f64)>,
}

/// The graph delay calculator: a forward BFS in ascending level order that
/// invokes the [`ArcDelayCalc`] once per driver vertex and writes arc
/// delays and slews back into the graph.
///
/// Incremental state: `invalid_delays` holds vertices whose delays must be
/// recomputed; `invalid_check_edges` holds timing-check edges whose margins
/// depend on changed slews. When a recomputed delay moves by more than
/// `incremental_tolerance`, downstream vertices are enqueued.
pub struct GraphDelayCalc {
    invalid_delays: BTreeSet<VertexId>,
    invalid_check_edges: BTreeSet<EdgeId>,
    delays_seeded: bool,
    delays_exist: bool,
    /// Delay changes at or below this magnitude do not propagate.
    pub incremental_tolerance: f64,
    cancel: Arc<AtomicBool>,
}

impl GraphDelayCalc {
    /// Creates a calculator with everything invalid.
    pub fn new() -> Self {
        Self {
            invalid_delays: BTreeSet::new(),
            invalid_check_edges: BTreeSet::new(),
            delays_seeded: false,
            delays_exist: false,
            incremental_tolerance: 0.0,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True once a full traversal has completed.
    pub fn delays_exist(&self) -> bool {
        self.delays_exist
    }

    /// Invalidates all delays; the next [`find_delays`](Self::find_delays)
    /// recomputes from scratch.
    pub fn delays_invalid(&mut self) {
        self.delays_seeded = false;
        self.delays_exist = false;
        self.invalid_delays.clear();
        self.invalid_check_edges.clear();
    }

    /// Invalidates one vertex's delays.
    pub fn delay_invalid(&mut self, vertex: VertexId) {
        self.invalid_delays.insert(vertex);
    }

    /// Invalidates one check edge's margins.
    pub fn check_edge_invalid(&mut self, edge: EdgeId) {
        self.invalid_check_edges.insert(edge);
    }

    /// True if any incremental work is pending.
    pub fn is_incremental_pending(&self) -> bool {
        !self.invalid_delays.is_empty() || !self.invalid_check_edges.is_empty()
    }

    /// The cooperative cancel flag, checked at level boundaries.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Runs delay calculation up to `up_to_level` (inclusive; `None` runs
    /// the whole graph). Returns the vertices whose slews or fanin arc
    /// delays changed, for arrival invalidation.
    pub fn find_delays(
        &mut self,
        graph: &mut Graph,
        calc: &dyn ArcDelayCalc,
        ctx: &DelayContext<'_>,
        up_to_level: Option<u32>,
    ) -> ChronosResult<BTreeSet<VertexId>> {
        debug_assert!(graph.levels_valid);
        let levels = vertices_by_level(graph);
        let mut queue: Vec<Vec<VertexId>> = vec![Vec::new(); levels.len()];

        if self.delays_seeded {
            for &vertex in &self.invalid_delays {
                let level = graph.vertex(vertex).level as usize;
                enqueue(graph, &mut queue, level, vertex);
            }
            self.invalid_delays.clear();
        } else {
            for (level, vertices) in levels.iter().enumerate() {
                for &vertex in vertices {
                    enqueue(graph, &mut queue, level, vertex);
                }
            }
            for edge_id in graph.edge_ids() {
                if graph.edge(edge_id).role.is_check() {
                    self.invalid_check_edges.insert(edge_id);
                }
            }
            self.delays_seeded = true;
        }

        let mut changed = BTreeSet::new();
        let limit = up_to_level.map_or(usize::MAX, |l| l as usize);
        for level in 0..queue.len().min(limit.saturating_add(1)) {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            let batch = std::mem::take(&mut queue[level]);
            if batch.is_empty() {
                continue;
            }
            let mut batch: Vec<VertexId> = batch;
            batch.sort();
            batch.dedup();
            for &vertex in &batch {
                graph
                    .vertex_mut(vertex)
                    .set_bfs_in_queue(BfsIndex::DelayCalc, false);
            }
            // Vertices within a level are independent; compute in
            // parallel, commit in id order at the barrier.
            let graph_ref: &Graph = graph;
            let results: Vec<(VertexId, DriverResult)> = batch
                .par_iter()
                .filter_map(|&v| compute_driver(graph_ref, calc, ctx, v).map(|r| (v, r)))
                .collect();
            for (_, result) in results {
                self.commit(graph, result, &mut queue, &mut changed);
            }
        }

        let check_changed = self.find_check_delays(graph, calc, ctx);
        changed.extend(check_changed);
        self.delays_exist = true;
        Ok(changed)
    }

    fn commit(
        &mut self,
        graph: &mut Graph,
        result: DriverResult,
        queue: &mut [Vec<VertexId>],
        changed: &mut BTreeSet<VertexId>,
    ) {
        for (edge, arc_idx, ap_idx, value) in result.arc_delay_writes {
            if graph.arc_delay_annotated(edge, arc_idx, ap_idx) {
                continue;
            }
            let old = graph.arc_delay(edge, arc_idx, ap_idx);
            if self.delay_changed(old, value) {
                graph.set_arc_delay(edge, arc_idx, ap_idx, value);
                changed.insert(graph.edge(edge).to);
            }
        }
        for (vertex, rf, ap_idx, value) in result.slew_writes {
            if graph.slew_annotated(vertex, rf, ap_idx) {
                continue;
            }
            let old = graph.slew(vertex, rf, ap_idx);
            if self.delay_changed(old, value) {
                graph.set_slew(vertex, rf, ap_idx, value);
                changed.insert(vertex);
                // A changed slew re-dirties the fanout drivers and any
                // incident timing checks.
                let fanout: Vec<(VertexId, u32)> = graph
                    .out_edges(vertex)
                    .filter(|e| !e.is_disabled_loop)
                    .map(|e| (e.to, graph.vertex(e.to).level))
                    .collect();
                for (to, level) in fanout {
                    enqueue(graph, queue, level as usize, to);
                }
                let checks: Vec<EdgeId> = graph
                    .in_edges(vertex)
                    .chain(graph.out_edges(vertex))
                    .filter(|e| e.role.is_check())
                    .map(|e| e.id)
                    .collect();
                self.invalid_check_edges.extend(checks);
            }
        }
    }

    fn delay_changed(&self, old: f64, new: f64) -> bool {
        if self.incremental_tolerance > 0.0 {
            (new - old).abs() > self.incremental_tolerance
        } else {
            !fuzzy_equal(old, new)
        }
    }

    // Timing-check margins are computed after the slews they depend on
    // have settled.
    fn find_check_delays(
        &mut self,
        graph: &mut Graph,
        calc: &dyn ArcDelayCalc,
        ctx: &DelayContext<'_>,
    ) -> BTreeSet<VertexId> {
        let mut changed = BTreeSet::new();
        let edges: Vec<EdgeId> = std::mem::take(&mut self.invalid_check_edges)
            .into_iter()
            .collect();
        for edge_id in edges {
            let Some(arc_set) = gate_arc_set(graph, ctx.library, edge_id) else {
                continue;
            };
            let (from, to) = {
                let edge = graph.edge(edge_id);
                (edge.from, edge.to)
            };
            let mut writes = Vec::new();
            for ap in ctx.aps {
                for (arc_idx, arc) in arc_set.arcs.iter().enumerate() {
                    let from_slew = graph.slew(from, arc.from_rf, ap.index);
                    let to_slew = graph.slew(to, arc.to_rf, ap.index);
                    let margin = calc.check_delay(arc, from_slew, to_slew, 0.0);
                    writes.push((arc_idx, ap.index, margin));
                }
            }
            for (arc_idx, ap_idx, margin) in writes {
                if graph.arc_delay_annotated(edge_id, arc_idx, ap_idx) {
                    continue;
                }
                let old = graph.arc_delay(edge_id, arc_idx, ap_idx);
                if self.delay_changed(old, margin) {
                    graph.set_arc_delay(edge_id, arc_idx, ap_idx, margin);
                    changed.insert(to);
                }
            }
        }
        changed
    }
}

impl Default for GraphDelayCalc {
    fn default() -> Self {
        Self::new()
    }
}

fn enqueue(graph: &mut Graph, queue: &mut [Vec<VertexId>], level: usize, vertex: VertexId) {
    let v = graph.vertex_mut(vertex);
    if !v.bfs_in_queue(BfsIndex::DelayCalc) {
        v.set_bfs_in_queue(BfsIndex::DelayCalc, true);
        queue[level].push(vertex);
    }
}

fn gate_arc_set<'a>(graph: &Graph, library: &'a Library, edge: EdgeId) -> Option<&'a TimingArcSet> {
    match graph.edge(edge).kind {
        chronos_graph::EdgeKind::Gate { cell, arc_set, .. } => {
            Some(library.cell(cell).arc_set(arc_set))
        }
        chronos_graph::EdgeKind::Wire { .. } => None,
    }
}

// The net a driver vertex drives, from its wire out-edges.
fn driven_net(graph: &Graph, vertex: VertexId) -> Option<NetId> {
    graph.out_edges(vertex).find_map(|e| match e.kind {
        chronos_graph::EdgeKind::Wire { net } => Some(net),
        _ => None,
    })
}

// Per-driver delay calculation. Returns None for vertices with nothing to
// compute (pure loads whose slews are written by their net's driver).
fn compute_driver(
    graph: &Graph,
    calc: &dyn ArcDelayCalc,
    ctx: &DelayContext<'_>,
    vertex: VertexId,
) -> Option<DriverResult> {
    let gate_ins: Vec<&chronos_graph::Edge> = graph
        .in_edges(vertex)
        .filter(|e| !e.is_wire() && e.role.is_delay() && !e.is_disabled_cond)
        .collect();
    let net = driven_net(graph, vertex);
    if gate_ins.is_empty() && net.is_none() {
        return None;
    }

    // Load pin index map: unique load pins ordered by pin id.
    let (load_pins, pin_caps, wire_edges) = match net {
        None => (Vec::new(), Vec::new(), Vec::new()),
        Some(net) => {
            let mut wire_edges: Vec<(PinId, EdgeId)> = graph
                .out_edges(vertex)
                .filter(|e| e.is_wire())
                .map(|e| (graph.vertex(e.to).pin, e.id))
                .collect();
            wire_edges.sort();
            let load_pins: Vec<PinId> = wire_edges.iter().map(|(p, _)| *p).collect();
            let pin_caps: Vec<f64> = load_pins
                .iter()
                .map(|&p| {
                    ctx.network
                        .pin_port(p, ctx.library)
                        .map_or(0.0, |port| port.capacitance)
                })
                .collect();
            (load_pins, pin_caps, wire_edges)
        }
    };

    // One vertex in a multi-driver group owns the wire side arrays.
    let is_group_leader = match net {
        None => true,
        Some(net) => {
            let drivers = ctx.network.net_drivers(net, ctx.library);
            drivers.first() == Some(&graph.vertex(vertex).pin) || drivers.len() <= 1
        }
    };

    let mut result = DriverResult {
        arc_delay_writes: Vec::new(),
        slew_writes: Vec::new(),
    };

    for ap in ctx.aps {
        let reduced;
        let parasitic = match net.and_then(|n| ctx.parasitics.parasitic(n, ap.index)) {
            Some(p) => {
                reduced = p.reduce_to(calc.reduce_supported());
                Some(&reduced)
            }
            None => None,
        };
        let loads = DriverLoads {
            parasitic,
            load_pins: &load_pins,
            pin_caps: &pin_caps,
        };

        // Merged driver slew and per-load merges, per transition.
        let mut drvr_slew = [ap.min_max.init_value(); 2];
        let mut load_slews = vec![[ap.min_max.init_value(); 2]; load_pins.len()];
        let mut wire_delays = vec![[ap.min_max.init_value(); 2]; load_pins.len()];

        if gate_ins.is_empty() {
            // Input port with no driving cell.
            for rf in RiseFall::ALL {
                let input_slew = graph.slew(vertex, rf, ap.index);
                let port_result = calc.input_port_delay(input_slew, &loads, ctx.sink);
                drvr_slew[rf.index()] = ap.min_max.worst_of(drvr_slew[rf.index()], input_slew);
                for (i, _) in load_pins.iter().enumerate() {
                    load_slews[i][rf.index()] = ap
                        .min_max
                        .worst_of(load_slews[i][rf.index()], port_result.load_slews[i]);
                    wire_delays[i][rf.index()] = ap
                        .min_max
                        .worst_of(wire_delays[i][rf.index()], port_result.wire_delays[i]);
                }
            }
        } else {
            for edge in &gate_ins {
                let Some(arc_set) = gate_arc_set(graph, ctx.library, edge.id) else {
                    continue;
                };
                for (arc_idx, arc) in arc_set.arcs.iter().enumerate() {
                    let input_slew = graph.slew(edge.from, arc.from_rf, ap.index);
                    let gate_result = calc.gate_delay(arc, input_slew, &loads, ctx.sink);
                    result
                        .arc_delay_writes
                        .push((edge.id, arc_idx, ap.index, gate_result.gate_delay));
                    let rf = arc.to_rf.index();
                    drvr_slew[rf] = ap.min_max.worst_of(drvr_slew[rf], gate_result.drvr_slew);
                    for (i, _) in load_pins.iter().enumerate() {
                        load_slews[i][rf] =
                            ap.min_max.worst_of(load_slews[i][rf], gate_result.load_slews[i]);
                        wire_delays[i][rf] =
                            ap.min_max.worst_of(wire_delays[i][rf], gate_result.wire_delays[i]);
                    }
                }
            }
            for rf in RiseFall::ALL {
                if drvr_slew[rf.index()] != ap.min_max.init_value() {
                    result
                        .slew_writes
                        .push((vertex, rf, ap.index, drvr_slew[rf.index()]));
                }
            }
        }

        if is_group_leader {
            for (i, &(load_pin, wire_edge)) in wire_edges.iter().enumerate() {
                let load_vertex = graph.pin_load_vertex(load_pin);
                for rf in RiseFall::ALL {
                    let delay = wire_delays[i][rf.index()];
                    if delay != ap.min_max.init_value() {
                        result
                            .arc_delay_writes
                            .push((wire_edge, rf.index(), ap.index, delay));
                    }
                    let slew = load_slews[i][rf.index()];
                    if slew != ap.min_max.init_value() {
                        if let Some(load_vertex) = load_vertex {
                            result.slew_writes.push((load_vertex, rf, ap.index, slew));
                        }
                    }
                }
            }
        }
    }

    Some(result)
}
