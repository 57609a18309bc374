//! Forward arrival search and backward required search.

use crate::path::{Path, PathRef, PathStore, PrevPath};
use crate::path_end::{visit_path_ends, PathEnd};
use crate::tag::{ClkInfo, Tag, TagDb, TagGroup, TagId};
use chronos_common::{fuzzy_equal, ChronosResult, Interner, MinMax, RiseFall, Slack};
use chronos_dcalc::AnalysisPt;
use chronos_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use chronos_graph::{levelize::vertices_by_level, BfsIndex, Edge, Graph, VertexId};
use chronos_netlist::{InstanceId, Library, Network, PinId, PinKind, TimingRole};
use chronos_sdc::{DerateCategory, DeratePathKind, ExceptionKind, ExceptionState, Sdc};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Read-only collaborators handed to the searches.
pub struct SearchContext<'a> {
    /// The linked network.
    pub network: &'a Network,
    /// The liberty library.
    pub library: &'a Library,
    /// The constraint set.
    pub sdc: &'a Sdc,
    /// The name interner.
    pub interner: &'a Interner,
    /// Diagnostic sink.
    pub sink: &'a DiagnosticSink,
    /// Analysis points, in index order.
    pub aps: &'a [AnalysisPt],
}

impl SearchContext<'_> {
    /// The owning instance of a pin, for exception matching.
    pub fn instance_of(&self, pin: PinId) -> Option<InstanceId> {
        match self.network.pin(pin).kind {
            PinKind::InstancePin { instance, .. } => Some(instance),
            _ => None,
        }
    }
}

// One merged arrival slot produced by the compute phase.
#[derive(Debug, Clone)]
struct PathSlot {
    tag: TagId,
    arrival: f64,
    prev: Option<PrevPath>,
}

/// The search engine: owns the tag tables, the path store, the endpoint
/// set, and the invalidation state for both directions.
pub struct Search {
    /// Tag, clock-info, and tag-group intern tables.
    pub tag_db: TagDb,
    /// Per-vertex path arrays.
    pub paths: PathStore,
    endpoints: BTreeSet<VertexId>,
    invalid_arrivals: BTreeSet<VertexId>,
    arrivals_seeded: bool,
    arrivals_exist: bool,
    requireds_exist: bool,
    // Latch data flows through D->Q arcs only after the first full pass.
    propagate_latch_data: bool,
    cancel: Arc<AtomicBool>,
}

impl Search {
    /// Creates a search engine with nothing computed.
    pub fn new() -> Self {
        Self {
            tag_db: TagDb::new(),
            paths: PathStore::default(),
            endpoints: BTreeSet::new(),
            invalid_arrivals: BTreeSet::new(),
            arrivals_seeded: false,
            arrivals_exist: false,
            requireds_exist: false,
            propagate_latch_data: false,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True once arrivals exist and no invalidation is pending.
    pub fn arrivals_valid(&self) -> bool {
        self.arrivals_exist && self.invalid_arrivals.is_empty()
    }

    /// True once requireds exist.
    pub fn requireds_exist(&self) -> bool {
        self.requireds_exist
    }

    /// The current endpoint set.
    pub fn endpoints(&self) -> &BTreeSet<VertexId> {
        &self.endpoints
    }

    /// The cooperative cancel flag, checked at level boundaries.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Invalidates all arrivals and requireds.
    pub fn arrivals_invalid(&mut self) {
        self.arrivals_seeded = false;
        self.arrivals_exist = false;
        self.requireds_exist = false;
        self.propagate_latch_data = false;
        self.invalid_arrivals.clear();
    }

    /// Invalidates one vertex's arrivals (and therefore all requireds).
    pub fn arrival_invalid(&mut self, vertex: VertexId) {
        self.invalid_arrivals.insert(vertex);
        self.requireds_exist = false;
    }

    /// Invalidates all requireds.
    pub fn requireds_invalid(&mut self) {
        self.requireds_exist = false;
    }

    /// Resets to the virgin state, releasing interned objects and path
    /// arrays in batch.
    pub fn clear(&mut self) {
        self.tag_db.clear();
        self.paths.clear();
        self.endpoints.clear();
        self.invalid_arrivals.clear();
        self.arrivals_seeded = false;
        self.arrivals_exist = false;
        self.requireds_exist = false;
        self.propagate_latch_data = false;
    }

    /// Runs arrivals, requireds, and the latch borrowing fixed point.
    pub fn update(&mut self, graph: &mut Graph, ctx: &SearchContext<'_>) -> ChronosResult<()> {
        self.find_arrivals(graph, ctx)?;
        self.find_requireds(graph, ctx)?;

        let latch_outputs: Vec<VertexId> = graph
            .edge_ids()
            .filter_map(|e| {
                let edge = graph.edge(e);
                (edge.role == TimingRole::LatchDtoQ && !edge.is_disabled()).then_some(edge.to)
            })
            .collect();
        if latch_outputs.is_empty() {
            return Ok(());
        }

        // Latch borrowing fixed point: re-derive Q arrivals from D
        // arrivals, re-propagate, and stop when the summed negative slack
        // stops improving or the iteration cap is hit.
        self.propagate_latch_data = true;
        let mut prev_tns = self.total_negative_slack(MinMax::Max, graph, ctx);
        let limit = ctx.sdc.latch_borrow_iteration_limit;
        let mut converged = false;
        for _ in 0..limit {
            for &q in &latch_outputs {
                self.invalid_arrivals.insert(q);
            }
            self.find_arrivals(graph, ctx)?;
            self.find_requireds(graph, ctx)?;
            let tns = self.total_negative_slack(MinMax::Max, graph, ctx);
            if tns >= prev_tns - 1e-9 {
                converged = true;
                break;
            }
            prev_tns = tns;
        }
        if !converged {
            ctx.sink.emit(Diagnostic::warning(
                DiagnosticCode::new(Category::Timing, 50),
                format!("latch borrowing did not converge in {limit} iterations"),
            ));
        }
        Ok(())
    }

    /// Forward BFS filling tagged arrivals, level by level.
    pub fn find_arrivals(&mut self, graph: &mut Graph, ctx: &SearchContext<'_>) -> ChronosResult<()> {
        debug_assert!(graph.levels_valid);
        self.paths.resize(graph.vertex_count());
        let levels = vertices_by_level(graph);
        let mut queue: Vec<Vec<VertexId>> = vec![Vec::new(); levels.len()];

        if self.arrivals_seeded {
            let pending = std::mem::take(&mut self.invalid_arrivals);
            for vertex in pending {
                enqueue(graph, &mut queue, vertex, BfsIndex::Arrival);
            }
        } else {
            self.paths.clear();
            self.endpoints.clear();
            self.invalid_arrivals.clear();
            for vertex in self.seed_vertices(graph, ctx) {
                enqueue(graph, &mut queue, vertex, BfsIndex::Arrival);
            }
            self.arrivals_seeded = true;
        }

        for level in 0..queue.len() {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            let mut batch = std::mem::take(&mut queue[level]);
            if batch.is_empty() {
                continue;
            }
            batch.sort();
            batch.dedup();
            for &vertex in &batch {
                graph
                    .vertex_mut(vertex)
                    .set_bfs_in_queue(BfsIndex::Arrival, false);
            }
            let graph_ref: &Graph = graph;
            let results: Vec<(VertexId, Vec<PathSlot>)> = batch
                .par_iter()
                .map(|&v| (v, self.compute_arrivals(graph_ref, ctx, v)))
                .collect();
            for (vertex, slots) in results {
                self.commit_arrivals(graph, ctx, vertex, slots, &mut queue);
            }
        }

        self.arrivals_exist = true;
        Ok(())
    }

    // Vertices that can originate arrivals: clock sources and top-level
    // input port drivers.
    fn seed_vertices(&self, graph: &Graph, ctx: &SearchContext<'_>) -> Vec<VertexId> {
        let mut seeds = Vec::new();
        for vertex_id in graph.vertex_ids() {
            let vertex = graph.vertex(vertex_id);
            let pin = vertex.pin;
            if graph.pin_drvr_vertex(pin) != Some(vertex_id) {
                continue;
            }
            let is_clock_src = ctx.sdc.is_clock_source(pin);
            let is_input_port = matches!(
                ctx.network.pin(pin).kind,
                PinKind::TopPort {
                    direction: chronos_netlist::PortDirection::Input
                        | chronos_netlist::PortDirection::Bidirect
                }
            );
            if is_clock_src || is_input_port {
                seeds.push(vertex_id);
            }
        }
        seeds
    }

    // Seed slots originating at this vertex: clock arrivals at clock
    // source pins, input-delay arrivals and unclocked starts at ports.
    fn seed_slots(&self, graph: &Graph, ctx: &SearchContext<'_>, vertex: VertexId) -> Vec<PathSlot> {
        let pin = graph.vertex(vertex).pin;
        if graph.pin_drvr_vertex(pin) != Some(vertex) {
            return Vec::new();
        }
        let mut slots = Vec::new();

        let clocks = ctx.sdc.clocks_on_pin(pin);
        for clk_id in &clocks {
            let clock = ctx.sdc.clock(*clk_id);
            for ap in ctx.aps {
                for rf in RiseFall::ALL {
                    let insertion = clock.insertion(ap.min_max);
                    let latency = if clock.is_propagated {
                        0.0
                    } else {
                        clock.latency(ap.min_max)
                    };
                    let clk_info = self.tag_db.intern_clk_info(ClkInfo {
                        clk_edge: Some(chronos_sdc::ClockEdge::new(*clk_id, rf)),
                        clk_src: Some(pin),
                        is_propagated: clock.is_propagated,
                        is_gen_clk_src_path: clock.is_generated,
                        pulse_sense: None,
                        insertion,
                        latency,
                        min_max: ap.min_max,
                        crpr_clk_path: None,
                    });
                    let tag = self.tag_db.intern_tag(Tag {
                        rf,
                        min_max: ap.min_max,
                        ap_index: ap.index,
                        clk_info,
                        is_clk: true,
                        input_delay: None,
                        is_segment_start: false,
                        states: Vec::new(),
                    });
                    slots.push(PathSlot {
                        tag,
                        arrival: clock.edge_time(rf) + insertion + latency,
                        prev: None,
                    });
                }
            }
        }

        let is_input_port = matches!(
            ctx.network.pin(pin).kind,
            PinKind::TopPort {
                direction: chronos_netlist::PortDirection::Input
                    | chronos_netlist::PortDirection::Bidirect
            }
        );
        if !is_input_port {
            return slots;
        }

        let mut has_input_delay = false;
        for (idx, delay) in ctx.sdc.input_delays.iter().enumerate() {
            if delay.pin != pin {
                continue;
            }
            has_input_delay = true;
            for ap in ctx.aps {
                for rf in RiseFall::ALL {
                    // Clock edge time plus ideal clock latency; a reference
                    // pin substitutes the clock's source arrival.
                    let (base, clk_edge, clk_src) = match delay.clock_edge {
                        Some(edge) => {
                            let clock = ctx.sdc.clock(edge.clock);
                            let base = clock.edge_time(edge.rf)
                                + clock.insertion(ap.min_max)
                                + clock.latency(ap.min_max);
                            (base, Some(edge), clock.source_pins.first().copied())
                        }
                        None => (0.0, None, None),
                    };
                    let clk_info = self.tag_db.intern_clk_info(ClkInfo {
                        clk_edge,
                        clk_src,
                        is_propagated: false,
                        is_gen_clk_src_path: false,
                        pulse_sense: None,
                        insertion: 0.0,
                        latency: 0.0,
                        min_max: ap.min_max,
                        crpr_clk_path: None,
                    });
                    let clock_id = clk_edge.map(|e| e.clock);
                    let states = self.initial_states(ctx, pin, rf, clock_id, ap.min_max);
                    let tag = self.tag_db.intern_tag(Tag {
                        rf,
                        min_max: ap.min_max,
                        ap_index: ap.index,
                        clk_info,
                        is_clk: false,
                        input_delay: Some(idx as u32),
                        is_segment_start: false,
                        states,
                    });
                    slots.push(PathSlot {
                        tag,
                        arrival: base + delay.delay(ap.min_max),
                        prev: None,
                    });
                }
            }
        }

        if !has_input_delay && clocks.is_empty() && ctx.sdc.use_default_arrival_clock {
            // Unconstrained input start: only with the default arrival
            // clock enabled does the input get a synthetic zero-arrival
            // tag; otherwise it originates no paths.
            for ap in ctx.aps {
                for rf in RiseFall::ALL {
                    let clk_info = self.tag_db.intern_clk_info(ClkInfo::unclocked(ap.min_max));
                    let states = self.initial_states(ctx, pin, rf, None, ap.min_max);
                    let tag = self.tag_db.intern_tag(Tag {
                        rf,
                        min_max: ap.min_max,
                        ap_index: ap.index,
                        clk_info,
                        is_clk: false,
                        input_delay: None,
                        is_segment_start: false,
                        states,
                    });
                    slots.push(PathSlot {
                        tag,
                        arrival: 0.0,
                        prev: None,
                    });
                }
            }
        }
        slots
    }

    // Exception states entering at a path start or launch point.
    fn initial_states(
        &self,
        ctx: &SearchContext<'_>,
        pin: PinId,
        rf: RiseFall,
        clock: Option<chronos_sdc::ClockId>,
        min_max: MinMax,
    ) -> Vec<ExceptionState> {
        let instance = ctx.instance_of(pin);
        let mut states: Vec<ExceptionState> = ctx
            .sdc
            .exceptions
            .iter()
            .filter(|exc| exc.matches_min_max(min_max))
            .filter(|exc| exc.matches_from(pin, rf, clock, instance))
            .map(|exc| ExceptionState::initial(exc.id))
            .collect();
        states.sort();
        states
    }

    // Per-vertex merge of seed slots and propagated in-edge arrivals.
    fn compute_arrivals(
        &self,
        graph: &Graph,
        ctx: &SearchContext<'_>,
        vertex: VertexId,
    ) -> Vec<PathSlot> {
        let mut slots: Vec<PathSlot> = self.seed_slots(graph, ctx, vertex);

        let mut merge = |slot: PathSlot, min_max: MinMax| {
            if let Some(existing) = slots.iter_mut().find(|s| s.tag == slot.tag) {
                if min_max.is_beyond(slot.arrival, existing.arrival) {
                    existing.arrival = slot.arrival;
                    existing.prev = slot.prev;
                }
            } else {
                slots.push(slot);
            }
        };

        for edge in graph.in_edges(vertex) {
            if !self.edge_searchable(graph, ctx, edge) {
                continue;
            }
            let from_paths = self.paths.paths(edge.from);
            for (from_idx, from_path) in from_paths.iter().enumerate() {
                let from_tag = self.tag_db.tag(from_path.tag);
                for (arc_idx, from_rf, to_rf) in edge_arcs(ctx, edge) {
                    if from_rf != from_tag.rf {
                        continue;
                    }
                    let from_ref = PathRef {
                        vertex: edge.from,
                        index: from_idx as u32,
                    };
                    let Some(to_tag) =
                        self.thru_tag(graph, ctx, &from_tag, from_ref, edge, to_rf)
                    else {
                        continue;
                    };
                    let ap = ctx.aps[from_tag.ap_index];
                    let delay = self.derated_delay(
                        graph,
                        ctx,
                        edge,
                        arc_idx,
                        from_tag.is_clk,
                        to_rf,
                        ap,
                    );
                    merge(
                        PathSlot {
                            tag: to_tag,
                            arrival: from_path.arrival + delay,
                            prev: Some(PrevPath {
                                path: from_ref,
                                edge: edge.id,
                                arc_idx: arc_idx as u8,
                            }),
                        },
                        from_tag.min_max,
                    );
                }
            }
        }

        slots.sort_by_key(|s| s.tag);
        slots
    }

    // Edge admission for the forward search.
    fn edge_searchable(&self, graph: &Graph, ctx: &SearchContext<'_>, edge: &Edge) -> bool {
        if edge.is_disabled() || edge.role.is_check() {
            return false;
        }
        if edge.role == TimingRole::LatchDtoQ && !self.propagate_latch_data {
            return false;
        }
        if edge.is_bidirect_inst_path && !ctx.sdc.bidirect_inst_paths_enabled {
            return false;
        }
        !graph.vertex(edge.from).is_disabled_constraint
            && !graph.vertex(edge.to).is_disabled_constraint
    }

    /// Mutates a tag across an edge: clock-ness propagation, exception
    /// state growth, launch-point bookkeeping. Returns `None` when a
    /// matching false path kills the path.
    pub(crate) fn thru_tag(
        &self,
        graph: &Graph,
        ctx: &SearchContext<'_>,
        from_tag: &Tag,
        from_ref: PathRef,
        edge: &Edge,
        to_rf: RiseFall,
    ) -> Option<TagId> {
        let to_vertex = graph.vertex(edge.to);
        let to_pin = to_vertex.pin;
        let to_instance = ctx.instance_of(to_pin);
        let clk_info = self.tag_db.clk_info(from_tag.clk_info);

        let to_is_clk = from_tag.is_clk
            && match edge.role {
                TimingRole::Wire | TimingRole::Combinational => {
                    to_vertex.has_downstream_clk_pin || to_vertex.is_reg_clk
                }
                TimingRole::TristateEnable | TimingRole::TristateDisable => {
                    ctx.sdc.clk_thru_tristate
                        && (to_vertex.has_downstream_clk_pin || to_vertex.is_reg_clk)
                }
                _ => false,
            };

        let launches_data = from_tag.is_clk && !to_is_clk;
        let (clk_info_id, mut states, is_segment_start) = if launches_data {
            // Record the clock-path prefix for CRPR and gather the
            // exceptions that start at this launch.
            let mut info = (*clk_info).clone();
            info.crpr_clk_path = Some(from_ref);
            let clock = info.clk_edge.map(|e| e.clock);
            (
                self.tag_db.intern_clk_info(info),
                self.initial_states(ctx, to_pin, to_rf, clock, from_tag.min_max),
                edge.role == TimingRole::LatchDtoQ,
            )
        } else {
            let states: Vec<ExceptionState> = from_tag
                .states
                .iter()
                .map(|state| {
                    let exception = ctx.sdc.exception(state.exception);
                    state.advanced(exception, to_pin, to_rf, to_instance)
                })
                .collect();
            (
                from_tag.clk_info,
                states,
                from_tag.is_segment_start || edge.role == TimingRole::LatchDtoQ,
            )
        };

        states.sort();
        states.dedup();

        // A complete false path with no endpoint filter kills the path
        // here; endpoint-filtered false paths kill at the endpoint.
        for state in &states {
            let exception = ctx.sdc.exception(state.exception);
            if matches!(exception.kind, ExceptionKind::FalsePath)
                && state.is_complete(exception)
                && exception.to.is_none()
            {
                return None;
            }
        }

        Some(self.tag_db.intern_tag(Tag {
            rf: to_rf,
            min_max: from_tag.min_max,
            ap_index: from_tag.ap_index,
            clk_info: clk_info_id,
            is_clk: to_is_clk,
            input_delay: if launches_data {
                None
            } else {
                from_tag.input_delay
            },
            is_segment_start,
            states,
        }))
    }

    /// An arc delay derated for its path context, read at search time.
    pub(crate) fn derated_delay(
        &self,
        graph: &Graph,
        ctx: &SearchContext<'_>,
        edge: &Edge,
        arc_idx: usize,
        from_is_clk: bool,
        rf: RiseFall,
        ap: AnalysisPt,
    ) -> f64 {
        let raw = graph.arc_delay(edge.id, arc_idx, ap.index);
        let path_kind = if from_is_clk {
            DeratePathKind::Clk
        } else {
            DeratePathKind::Data
        };
        let factor = match edge.kind {
            chronos_graph::EdgeKind::Wire { net } => {
                ctx.sdc
                    .derates
                    .net_factor(path_kind, rf, ap.min_max, Some(net))
            }
            chronos_graph::EdgeKind::Gate { instance, cell, .. } => ctx.sdc.derates.cell_factor(
                DerateCategory::CellDelay,
                path_kind,
                rf,
                ap.min_max,
                Some(instance),
                Some(cell),
            ),
        };
        raw * factor
    }

    fn commit_arrivals(
        &mut self,
        graph: &mut Graph,
        ctx: &SearchContext<'_>,
        vertex: VertexId,
        slots: Vec<PathSlot>,
        queue: &mut [Vec<VertexId>],
    ) {
        let current = self.paths.paths(vertex);
        let unchanged = current.len() == slots.len()
            && current
                .iter()
                .zip(slots.iter())
                .all(|(p, s)| p.tag == s.tag && fuzzy_equal(p.arrival, s.arrival));
        if unchanged {
            return;
        }

        let tags: Vec<TagId> = slots.iter().map(|s| s.tag).collect();
        let group = self.tag_db.intern_tag_group(TagGroup { tags });
        graph.vertex_mut(vertex).tag_group_index = Some(group.as_raw());
        let paths: Vec<Path> = slots
            .into_iter()
            .map(|s| Path {
                tag: s.tag,
                arrival: s.arrival,
                required: None,
                prev: s.prev,
                is_enum: false,
            })
            .collect();
        self.paths.make_paths(vertex, paths);
        self.requireds_exist = false;

        if self.is_endpoint(graph, ctx, vertex) {
            self.endpoints.insert(vertex);
        }

        let fanout: Vec<VertexId> = graph
            .out_edges(vertex)
            .filter(|e| self.edge_searchable(graph, ctx, e))
            .map(|e| e.to)
            .collect();
        for to in fanout {
            enqueue(graph, queue, to, BfsIndex::Arrival);
        }
    }

    /// True if the vertex terminates timing paths: it has check edges, an
    /// output-delay constraint, or no searchable fanout.
    pub fn is_endpoint(&self, graph: &Graph, ctx: &SearchContext<'_>, vertex: VertexId) -> bool {
        let v = graph.vertex(vertex);
        if v.has_checks {
            return true;
        }
        let pin = v.pin;
        if ctx.sdc.output_delays_on(pin).next().is_some() {
            return true;
        }
        graph
            .out_edges(vertex)
            .all(|e| e.is_disabled() || e.role.is_check())
    }

    /// Backward BFS filling requireds from the endpoint checks.
    pub fn find_requireds(&mut self, graph: &Graph, ctx: &SearchContext<'_>) -> ChronosResult<()> {
        // Clear stale requireds.
        for vertex in graph.vertex_ids() {
            for path in self.paths.paths_mut(vertex) {
                path.required = None;
            }
        }

        // Seed at endpoints from the path-end checks.
        let endpoints: Vec<VertexId> = self.endpoints.iter().copied().collect();
        for vertex in endpoints {
            let ends = visit_path_ends(self, graph, ctx, vertex);
            for end in ends {
                if let Some(required) = end.required {
                    let paths = self.paths.paths_mut(vertex);
                    let path = &mut paths[end.path_index as usize];
                    path.required = Some(match path.required {
                        None => required,
                        Some(existing) => merge_required(end.min_max, existing, required),
                    });
                }
            }
        }

        // Backward by descending level.
        let levels = vertices_by_level(graph);
        for level_vertices in levels.iter().rev() {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
            let results: Vec<(VertexId, Vec<Option<f64>>)> = level_vertices
                .par_iter()
                .map(|&v| (v, self.compute_requireds(graph, ctx, v)))
                .collect();
            for (vertex, requireds) in results {
                let paths = self.paths.paths_mut(vertex);
                for (path, required) in paths.iter_mut().zip(requireds) {
                    if let Some(required) = required {
                        path.required = Some(match path.required {
                            None => required,
                            Some(existing) => {
                                let tag = self.tag_db.tag(path.tag);
                                merge_required(tag.min_max, existing, required)
                            }
                        });
                    }
                }
            }
        }

        self.requireds_exist = true;
        Ok(())
    }

    // Requireds propagated from this vertex's fanout, one slot per path.
    fn compute_requireds(
        &self,
        graph: &Graph,
        ctx: &SearchContext<'_>,
        vertex: VertexId,
    ) -> Vec<Option<f64>> {
        let paths = self.paths.paths(vertex);
        let mut requireds: Vec<Option<f64>> = vec![None; paths.len()];
        for edge in graph.out_edges(vertex) {
            if !self.edge_searchable(graph, ctx, edge) {
                continue;
            }
            let to_paths = self.paths.paths(edge.to);
            for (index, path) in paths.iter().enumerate() {
                let from_tag = self.tag_db.tag(path.tag);
                for (arc_idx, from_rf, to_rf) in edge_arcs(ctx, edge) {
                    if from_rf != from_tag.rf {
                        continue;
                    }
                    let from_ref = PathRef {
                        vertex,
                        index: index as u32,
                    };
                    let Some(to_tag) =
                        self.thru_tag(graph, ctx, &from_tag, from_ref, edge, to_rf)
                    else {
                        continue;
                    };
                    let Some(to_path) = to_paths.iter().find(|p| p.tag == to_tag) else {
                        continue;
                    };
                    let Some(to_required) = to_path.required else {
                        continue;
                    };
                    let ap = ctx.aps[from_tag.ap_index];
                    let delay = self.derated_delay(
                        graph,
                        ctx,
                        edge,
                        arc_idx,
                        from_tag.is_clk,
                        to_rf,
                        ap,
                    );
                    let candidate = to_required - delay;
                    requireds[index] = Some(match requireds[index] {
                        None => candidate,
                        Some(existing) => merge_required(from_tag.min_max, existing, candidate),
                    });
                }
            }
        }
        requireds
    }

    /// The slack of one path slot, when its required exists.
    pub fn path_slack(&self, path: &Path) -> Option<Slack> {
        let required = path.required?;
        let tag = self.tag_db.tag(path.tag);
        Some(match tag.min_max {
            MinMax::Max => required - path.arrival,
            MinMax::Min => path.arrival - required,
        })
    }

    /// Worst slack over all endpoints for one pole, with the vertex that
    /// carries it.
    pub fn worst_slack(
        &self,
        min_max: MinMax,
        graph: &Graph,
        ctx: &SearchContext<'_>,
    ) -> Option<(Slack, VertexId)> {
        let _ = (graph, ctx);
        let mut worst: Option<(Slack, VertexId)> = None;
        for &vertex in &self.endpoints {
            for path in self.paths.paths(vertex) {
                let tag = self.tag_db.tag(path.tag);
                if tag.min_max != min_max || tag.is_clk {
                    continue;
                }
                if let Some(slack) = self.path_slack(path) {
                    if worst.map_or(true, |(w, _)| slack < w) {
                        worst = Some((slack, vertex));
                    }
                }
            }
        }
        worst
    }

    /// The sum of negative endpoint slacks for one pole (zero or
    /// negative; more negative is worse).
    pub fn total_negative_slack(
        &self,
        min_max: MinMax,
        graph: &Graph,
        ctx: &SearchContext<'_>,
    ) -> Slack {
        let _ = (graph, ctx);
        let mut tns = 0.0;
        for &vertex in &self.endpoints {
            let mut vertex_worst: Option<Slack> = None;
            for path in self.paths.paths(vertex) {
                let tag = self.tag_db.tag(path.tag);
                if tag.min_max != min_max || tag.is_clk {
                    continue;
                }
                if let Some(slack) = self.path_slack(path) {
                    if vertex_worst.map_or(true, |w| slack < w) {
                        vertex_worst = Some(slack);
                    }
                }
            }
            if let Some(slack) = vertex_worst {
                if slack < 0.0 {
                    tns += slack;
                }
            }
        }
        tns
    }

    /// All path ends at the current endpoints.
    pub fn find_path_ends(&self, graph: &Graph, ctx: &SearchContext<'_>) -> Vec<PathEnd> {
        let mut ends = Vec::new();
        for &vertex in &self.endpoints {
            ends.extend(visit_path_ends(self, graph, ctx, vertex));
        }
        ends
    }
}

impl Default for Search {
    fn default() -> Self {
        Self::new()
    }
}

// Required merge: min for late analysis, max for early.
fn merge_required(min_max: MinMax, a: f64, b: f64) -> f64 {
    match min_max {
        MinMax::Max => a.min(b),
        MinMax::Min => a.max(b),
    }
}

fn enqueue(graph: &mut Graph, queue: &mut [Vec<VertexId>], vertex: VertexId, index: BfsIndex) {
    let level = graph.vertex(vertex).level as usize;
    let v = graph.vertex_mut(vertex);
    if !v.bfs_in_queue(index) {
        v.set_bfs_in_queue(index, true);
        queue[level].push(vertex);
    }
}

// The (arc index, from transition, to transition) triples of an edge.
pub(crate) fn edge_arcs(ctx: &SearchContext<'_>, edge: &Edge) -> Vec<(usize, RiseFall, RiseFall)> {
    match edge.kind {
        chronos_graph::EdgeKind::Wire { .. } => RiseFall::ALL
            .into_iter()
            .map(|rf| (rf.index(), rf, rf))
            .collect(),
        chronos_graph::EdgeKind::Gate { cell, arc_set, .. } => ctx
            .library
            .cell(cell)
            .arc_set(arc_set)
            .arcs
            .iter()
            .enumerate()
            .map(|(i, arc)| (i, arc.from_rf, arc.to_rf))
            .collect(),
    }
}
