//! Path ends: one endpoint path with its governing check and slack.

use crate::crpr::crpr_credit;
use crate::search::{Search, SearchContext};
use chronos_common::{Ident, MinMax, Slack};
use chronos_graph::{Graph, VertexId};
use chronos_netlist::TimingRole;
use chronos_sdc::{
    ClockEdge, CrprMode, DerateCategory, DeratePathKind, ExceptionId, ExceptionKind,
    ExceptionPath,
};
use serde::{Deserialize, Serialize};

/// The classification of a path end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathEndKind {
    /// Setup check at a register or latch data pin.
    Setup,
    /// Hold check at a register or latch data pin.
    Hold,
    /// Recovery check on an asynchronous control.
    Recovery,
    /// Removal check on an asynchronous control.
    Removal,
    /// Setup-side check of a clock-gating enable.
    GatedClockSetup,
    /// Hold-side check of a clock-gating enable.
    GatedClockHold,
    /// Absolute path-delay bound.
    PathDelay,
    /// Output-delay constraint at a port.
    OutputDelay,
    /// No constraint reaches the endpoint.
    Unconstrained,
}

impl PathEndKind {
    /// True for the asynchronous (recovery/removal) checks.
    pub fn is_async(self) -> bool {
        matches!(self, PathEndKind::Recovery | PathEndKind::Removal)
    }

    /// True for the clock-gating checks.
    pub fn is_gated_clock(self) -> bool {
        matches!(self, PathEndKind::GatedClockSetup | PathEndKind::GatedClockHold)
    }
}

/// One endpoint's one path, classified and scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathEnd {
    /// The endpoint vertex.
    pub vertex: VertexId,
    /// Index of the path slot at the endpoint.
    pub path_index: u32,
    /// The classification.
    pub kind: PathEndKind,
    /// The analysis pole of the data path.
    pub min_max: MinMax,
    /// Data arrival at the endpoint.
    pub arrival: f64,
    /// Required time; `None` for unconstrained ends.
    pub required: Option<f64>,
    /// Slack; `None` for unconstrained ends.
    pub slack: Option<Slack>,
    /// Check margin (zero for delay bounds and output delays).
    pub margin: f64,
    /// CRPR credit returned to the slack.
    pub crpr: f64,
    /// Launching clock edge.
    pub src_clk_edge: Option<ClockEdge>,
    /// Capturing clock edge.
    pub tgt_clk_edge: Option<ClockEdge>,
    /// Governing exception, if any.
    pub exception: Option<ExceptionId>,
    /// The `group_path` name the endpoint matched, for report grouping.
    pub group_path: Option<Ident>,
}

// The exceptions whose states are complete on the path and whose endpoint
// filter accepts this end.
fn complete_exceptions<'a>(
    ctx: &'a SearchContext<'_>,
    tag: &crate::tag::Tag,
    vertex_pin: chronos_netlist::PinId,
    capture_clock: Option<chronos_sdc::ClockId>,
) -> Vec<&'a ExceptionPath> {
    let instance = ctx.instance_of(vertex_pin);
    tag.states
        .iter()
        .filter_map(|state| {
            let exception = ctx.sdc.exception(state.exception);
            (state.is_complete(exception)
                && exception.matches_min_max(tag.min_max)
                && exception.matches_to(vertex_pin, tag.rf, capture_clock, instance))
            .then_some(exception)
        })
        .collect()
}

fn group_path_name(candidates: &[&ExceptionPath]) -> Option<Ident> {
    candidates.iter().find_map(|exc| match &exc.kind {
        ExceptionKind::GroupPath { name } => Some(*name),
        _ => None,
    })
}

// Overlapping exceptions of different kinds on one endpoint resolve by
// priority; the loser is reported once per endpoint.
fn warn_exception_conflict(
    ctx: &SearchContext<'_>,
    candidates: &[&ExceptionPath],
    governing: Option<&ExceptionPath>,
    endpoint_name: &str,
) {
    let Some(governing) = governing else {
        return;
    };
    let conflicting = candidates.iter().any(|c| {
        c.id != governing.id
            && c.kind.priority() != governing.kind.priority()
            && !matches!(c.kind, ExceptionKind::GroupPath { .. } | ExceptionKind::Filter)
            && !matches!(governing.kind, ExceptionKind::GroupPath { .. })
    });
    if conflicting {
        ctx.sink.emit_once(
            chronos_diagnostics::Diagnostic::warning(
                chronos_diagnostics::DiagnosticCode::new(
                    chronos_diagnostics::Category::Constraint,
                    1,
                ),
                "overlapping path exceptions; the higher-priority exception governs",
            )
            .with_object(endpoint_name),
        );
    }
}

// Capture-edge shift for the default check plus any multicycle override.
fn capture_shift(
    governing: Option<&ExceptionPath>,
    min_max: MinMax,
    period: f64,
) -> f64 {
    let default_shift = match min_max {
        MinMax::Max => period,
        MinMax::Min => 0.0,
    };
    match governing.map(|e| &e.kind) {
        Some(ExceptionKind::Multicycle { cycles, hold }) => {
            let extra = (*cycles as f64 - 1.0) * period;
            match (min_max, hold) {
                (MinMax::Max, false) => default_shift + extra,
                (MinMax::Min, true) => default_shift + extra,
                _ => default_shift,
            }
        }
        _ => default_shift,
    }
}

/// Builds the path ends terminating at `vertex`: timing checks, output
/// delays, path-delay bounds, and the unconstrained fallback.
pub fn visit_path_ends(
    search: &Search,
    graph: &Graph,
    ctx: &SearchContext<'_>,
    vertex: VertexId,
) -> Vec<PathEnd> {
    let mut ends = Vec::new();
    let vertex_pin = graph.vertex(vertex).pin;
    let vertex_pin_name = ctx.interner.resolve(ctx.network.pin(vertex_pin).name);
    let paths = search.paths.paths(vertex);

    for (path_index, path) in paths.iter().enumerate() {
        let tag = search.tag_db.tag(path.tag);
        if tag.is_clk {
            continue;
        }
        let min_max = tag.min_max;
        let src_clk_edge = search.tag_db.clk_info(tag.clk_info).clk_edge;
        let mut produced = false;

        // Timing checks against captured clock paths.
        for check_edge in graph.in_edges(vertex) {
            if check_edge.is_disabled_constraint || check_edge.is_disabled_cond {
                continue;
            }
            let (kind, check_mm) = match check_edge.role {
                TimingRole::Setup => (PathEndKind::Setup, MinMax::Max),
                TimingRole::Hold => (PathEndKind::Hold, MinMax::Min),
                TimingRole::Recovery => (PathEndKind::Recovery, MinMax::Max),
                TimingRole::Removal => (PathEndKind::Removal, MinMax::Min),
                _ => continue,
            };
            if check_mm != min_max {
                continue;
            }
            let kind = if graph.vertex(vertex).is_gated_clk_enable {
                match kind {
                    PathEndKind::Setup => PathEndKind::GatedClockSetup,
                    PathEndKind::Hold => PathEndKind::GatedClockHold,
                    other => other,
                }
            } else {
                kind
            };
            let arcs = crate::search::edge_arcs(ctx, check_edge);
            let clk_vertex = check_edge.from;
            let clk_paths = search.paths.paths(clk_vertex);
            for (arc_idx, from_rf, to_rf) in arcs {
                if to_rf != tag.rf {
                    continue;
                }
                for (cp_idx, cp) in clk_paths.iter().enumerate() {
                    let cp_tag = search.tag_db.tag(cp.tag);
                    if !cp_tag.is_clk
                        || cp_tag.rf != from_rf
                        || cp_tag.min_max != min_max.opposite()
                    {
                        continue;
                    }
                    let cp_info = search.tag_db.clk_info(cp_tag.clk_info);
                    let Some(capture_edge) = cp_info.clk_edge else {
                        continue;
                    };
                    // Asynchronous clock groups are never timed against
                    // each other.
                    if let Some(launch_edge) = src_clk_edge {
                        if ctx
                            .sdc
                            .clocks_asynchronous(launch_edge.clock, capture_edge.clock)
                        {
                            continue;
                        }
                    }
                    let candidates =
                        complete_exceptions(ctx, &tag, vertex_pin, Some(capture_edge.clock));
                    let governing = ctx.sdc.highest_priority_exception(&candidates);
                    warn_exception_conflict(ctx, &candidates, governing, vertex_pin_name);
                    if matches!(governing.map(|e| &e.kind), Some(ExceptionKind::FalsePath)) {
                        continue;
                    }
                    let group_path = group_path_name(&candidates);
                    let clock = ctx.sdc.clock(capture_edge.clock);
                    let capture_time = clock.edge_time(capture_edge.rf);

                    let end = if let Some(ExceptionKind::PathDelay { delay, .. }) =
                        governing.map(|e| &e.kind)
                    {
                        let required = *delay;
                        PathEnd {
                            vertex,
                            path_index: path_index as u32,
                            kind: PathEndKind::PathDelay,
                            min_max,
                            arrival: path.arrival,
                            required: Some(required),
                            slack: Some(slack_of(min_max, path.arrival, required)),
                            margin: 0.0,
                            crpr: 0.0,
                            src_clk_edge,
                            tgt_clk_edge: Some(capture_edge),
                            exception: governing.map(|e| e.id),
                            group_path,
                        }
                    } else {
                        // A transparent latch closes within the launch
                        // cycle: its setup captures at the same-cycle
                        // closing edge rather than the next period.
                        let latch_check = match check_edge.kind {
                            chronos_graph::EdgeKind::Gate { cell, .. } => {
                                ctx.library.cell(cell).has_latch()
                            }
                            chronos_graph::EdgeKind::Wire { .. } => false,
                        };
                        let shift = if latch_check && min_max == MinMax::Max {
                            0.0
                        } else {
                            capture_shift(governing, min_max, clock.period)
                        };
                        let margin_raw =
                            graph.arc_delay(check_edge.id, arc_idx, tag.ap_index);
                        let margin = margin_raw
                            * check_derate(ctx, check_edge, to_rf, min_max);
                        let uncertainty = clock.uncertainty.value(min_max);
                        let crpr = if ctx.sdc.crpr_mode == CrprMode::Disabled {
                            0.0
                        } else {
                            let launch_prefix =
                                search.tag_db.clk_info(tag.clk_info).crpr_clk_path;
                            crpr_credit(
                                search,
                                graph,
                                ctx,
                                launch_prefix,
                                crate::path::PathRef {
                                    vertex: clk_vertex,
                                    index: cp_idx as u32,
                                },
                            )
                        };
                        // Capture-tree delay is everything the clock path
                        // accumulated beyond its nominal edge time.
                        let tree = cp.arrival - capture_time;
                        let required = match min_max {
                            MinMax::Max => {
                                capture_time + shift + tree - margin - uncertainty + crpr
                            }
                            MinMax::Min => {
                                capture_time + shift + tree + margin + uncertainty - crpr
                            }
                        };
                        PathEnd {
                            vertex,
                            path_index: path_index as u32,
                            kind,
                            min_max,
                            arrival: path.arrival,
                            required: Some(required),
                            slack: Some(slack_of(min_max, path.arrival, required)),
                            margin,
                            crpr,
                            src_clk_edge,
                            tgt_clk_edge: Some(capture_edge),
                            exception: governing.map(|e| e.id),
                            group_path,
                        }
                    };
                    ends.push(end);
                    produced = true;
                }
            }
        }

        // Output delays at port endpoints.
        for delay in ctx.sdc.output_delays_on(vertex_pin) {
            let capture_edges: Vec<ClockEdge> = match delay.clock_edge {
                Some(edge) => vec![edge],
                None => ctx
                    .sdc
                    .clocks
                    .iter()
                    .map(|c| ClockEdge::new(c.id, chronos_common::RiseFall::Rise))
                    .collect(),
            };
            for capture_edge in capture_edges {
                let candidates =
                    complete_exceptions(ctx, &tag, vertex_pin, Some(capture_edge.clock));
                let governing = ctx.sdc.highest_priority_exception(&candidates);
                if matches!(governing.map(|e| &e.kind), Some(ExceptionKind::FalsePath)) {
                    continue;
                }
                let group_path = group_path_name(&candidates);
                let clock = ctx.sdc.clock(capture_edge.clock);
                let capture_time = clock.edge_time(capture_edge.rf);
                let uncertainty = clock.uncertainty.value(min_max);
                let required = if let Some(ExceptionKind::PathDelay { delay: bound, .. }) =
                    governing.map(|e| &e.kind)
                {
                    *bound
                } else {
                    let shift = capture_shift(governing, min_max, clock.period);
                    match min_max {
                        MinMax::Max => {
                            capture_time + shift - delay.delay(MinMax::Max) - uncertainty
                        }
                        MinMax::Min => capture_time + shift + delay.delay(MinMax::Min) + uncertainty,
                    }
                };
                ends.push(PathEnd {
                    vertex,
                    path_index: path_index as u32,
                    kind: PathEndKind::OutputDelay,
                    min_max,
                    arrival: path.arrival,
                    required: Some(required),
                    slack: Some(slack_of(min_max, path.arrival, required)),
                    margin: 0.0,
                    crpr: 0.0,
                    src_clk_edge,
                    tgt_clk_edge: Some(capture_edge),
                    exception: governing.map(|e| e.id),
                    group_path,
                });
                produced = true;
            }
        }

        // Path-delay bounds that constrain otherwise-unchecked endpoints.
        if !produced {
            let candidates = complete_exceptions(ctx, &tag, vertex_pin, None);
            let governing = ctx.sdc.highest_priority_exception(&candidates);
            if let Some(exception) = governing {
                if let ExceptionKind::PathDelay { delay, min_max: bound_mm } = &exception.kind {
                    if *bound_mm == min_max {
                        let required = *delay;
                        ends.push(PathEnd {
                            vertex,
                            path_index: path_index as u32,
                            kind: PathEndKind::PathDelay,
                            min_max,
                            arrival: path.arrival,
                            required: Some(required),
                            slack: Some(slack_of(min_max, path.arrival, required)),
                            margin: 0.0,
                            crpr: 0.0,
                            src_clk_edge,
                            tgt_clk_edge: None,
                            exception: Some(exception.id),
                            group_path: group_path_name(&candidates),
                        });
                        produced = true;
                    }
                }
            }
        }

        // Unconstrained fallback, reported as "(no paths)" material.
        if !produced && ctx.sdc.report_unconstrained_paths {
            let candidates = complete_exceptions(ctx, &tag, vertex_pin, None);
            ends.push(PathEnd {
                vertex,
                path_index: path_index as u32,
                kind: PathEndKind::Unconstrained,
                min_max,
                arrival: path.arrival,
                required: None,
                slack: None,
                margin: 0.0,
                crpr: 0.0,
                src_clk_edge,
                tgt_clk_edge: None,
                exception: None,
                group_path: group_path_name(&candidates),
            });
        }
    }

    ends
}

fn slack_of(min_max: MinMax, arrival: f64, required: f64) -> Slack {
    match min_max {
        MinMax::Max => required - arrival,
        MinMax::Min => arrival - required,
    }
}

fn check_derate(
    ctx: &SearchContext<'_>,
    edge: &chronos_graph::Edge,
    rf: chronos_common::RiseFall,
    min_max: MinMax,
) -> f64 {
    match edge.kind {
        chronos_graph::EdgeKind::Gate { instance, cell, .. } => ctx.sdc.derates.cell_factor(
            DerateCategory::CellCheck,
            DeratePathKind::Data,
            rf,
            min_max,
            Some(instance),
            Some(cell),
        ),
        chronos_graph::EdgeKind::Wire { .. } => 1.0,
    }
}
