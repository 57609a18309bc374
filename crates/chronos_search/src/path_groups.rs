//! Grouping, ranking, and pruning of path ends for reporting.

use crate::path_end::{PathEnd, PathEndKind};
use crate::search::{Search, SearchContext};
use chronos_graph::{EdgeId, Graph, VertexId};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Group name for recovery/removal checks.
pub const ASYNC_GROUP: &str = "asynchronous";
/// Group name for clock-gating checks.
pub const GATED_CLK_GROUP: &str = "clock_gating";
/// Group name for unconstrained endpoints.
pub const UNCONSTRAINED_GROUP: &str = "unconstrained";
/// Group name for unclocked path-delay bounds.
pub const PATH_DELAY_GROUP: &str = "path_delay";

/// What to report: check classes, counts, pruning filters.
#[derive(Debug, Clone)]
pub struct ReportSpec {
    /// Path ends kept per group.
    pub group_path_count: usize,
    /// Path ends kept per endpoint vertex.
    pub endpoint_path_count: usize,
    /// Collapse ends differing only by transition.
    pub unique_pins: bool,
    /// Collapse ends traversing the same edge sequence.
    pub unique_edges: bool,
    /// Keep only ends with slack at or above this bound.
    pub slack_min: f64,
    /// Keep only ends with slack at or below this bound.
    pub slack_max: f64,
    /// Report setup-class ends.
    pub setup: bool,
    /// Report hold-class ends.
    pub hold: bool,
    /// Report recovery checks.
    pub recovery: bool,
    /// Report removal checks.
    pub removal: bool,
    /// Report clock-gating checks.
    pub gated_clock: bool,
    /// Report unconstrained endpoints.
    pub unconstrained: bool,
}

impl Default for ReportSpec {
    fn default() -> Self {
        Self {
            group_path_count: 1,
            endpoint_path_count: 1,
            unique_pins: false,
            unique_edges: false,
            slack_min: f64::NEG_INFINITY,
            slack_max: f64::INFINITY,
            setup: true,
            hold: true,
            recovery: true,
            removal: true,
            gated_clock: true,
            unconstrained: false,
        }
    }
}

impl ReportSpec {
    fn admits(&self, end: &PathEnd) -> bool {
        let kind_ok = match end.kind {
            PathEndKind::Setup | PathEndKind::PathDelay | PathEndKind::OutputDelay => {
                match end.min_max {
                    chronos_common::MinMax::Max => self.setup,
                    chronos_common::MinMax::Min => self.hold,
                }
            }
            PathEndKind::Hold => self.hold,
            PathEndKind::Recovery => self.recovery,
            PathEndKind::Removal => self.removal,
            PathEndKind::GatedClockSetup | PathEndKind::GatedClockHold => self.gated_clock,
            PathEndKind::Unconstrained => self.unconstrained,
        };
        if !kind_ok {
            return false;
        }
        match end.slack {
            Some(slack) => slack >= self.slack_min && slack <= self.slack_max,
            None => self.unconstrained,
        }
    }
}

/// A named collection of ranked path ends.
#[derive(Debug, Clone)]
pub struct PathGroup {
    /// Group name.
    pub name: String,
    /// Ends ranked worst-first.
    pub ends: Vec<PathEnd>,
}

/// Path ends sliced into user-visible groups.
#[derive(Debug, Clone, Default)]
pub struct PathGroups {
    /// Groups in name order.
    pub groups: Vec<PathGroup>,
}

impl PathGroups {
    /// Assigns, ranks, and prunes path ends into groups.
    pub fn make(
        ends: Vec<PathEnd>,
        spec: &ReportSpec,
        search: &Search,
        graph: &Graph,
        ctx: &SearchContext<'_>,
    ) -> Self {
        let mut by_group: BTreeMap<String, Vec<PathEnd>> = BTreeMap::new();
        for end in ends {
            if !spec.admits(&end) {
                continue;
            }
            let name = group_name(&end, ctx);
            by_group.entry(name).or_default().push(end);
        }

        let mut groups = Vec::new();
        for (name, mut ends) in by_group {
            // Worst slack first; ties broken by endpoint identity so the
            // ranking is bit-stable across runs.
            ends.sort_by(|a, b| {
                let sa = a.slack.unwrap_or(f64::INFINITY);
                let sb = b.slack.unwrap_or(f64::INFINITY);
                sa.partial_cmp(&sb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.vertex.cmp(&b.vertex))
                    .then(a.path_index.cmp(&b.path_index))
                    .then(a.kind.cmp_key().cmp(&b.kind.cmp_key()))
            });
            if spec.unique_pins {
                ends = collapse_unique_pins(ends);
            }
            if spec.unique_edges {
                ends = collapse_unique_edges(ends, search, graph);
            }
            ends = limit_per_endpoint(ends, spec.endpoint_path_count);
            ends.truncate(spec.group_path_count);
            groups.push(PathGroup { name, ends });
        }
        Self { groups }
    }

    /// The group with the given name.
    pub fn find_group(&self, name: &str) -> Option<&PathGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// All ends across groups, preserving per-group ranking.
    pub fn path_ends(&self) -> Vec<&PathEnd> {
        self.groups.iter().flat_map(|g| g.ends.iter()).collect()
    }
}

impl PathEndKind {
    fn cmp_key(self) -> u8 {
        match self {
            PathEndKind::Setup => 0,
            PathEndKind::Hold => 1,
            PathEndKind::Recovery => 2,
            PathEndKind::Removal => 3,
            PathEndKind::GatedClockSetup => 4,
            PathEndKind::GatedClockHold => 5,
            PathEndKind::PathDelay => 6,
            PathEndKind::OutputDelay => 7,
            PathEndKind::Unconstrained => 8,
        }
    }
}

// Group assignment, in priority order: user group_path, asynchronous,
// clock gating, unconstrained, launching clock name.
fn group_name(end: &PathEnd, ctx: &SearchContext<'_>) -> String {
    if let Some(name) = end.group_path {
        return ctx.interner.resolve(name).to_string();
    }
    if end.kind.is_async() {
        return ASYNC_GROUP.to_string();
    }
    if end.kind.is_gated_clock() {
        return GATED_CLK_GROUP.to_string();
    }
    if end.kind == PathEndKind::Unconstrained {
        return UNCONSTRAINED_GROUP.to_string();
    }
    if let Some(edge) = end.src_clk_edge {
        return ctx
            .interner
            .resolve(ctx.sdc.clock(edge.clock).name)
            .to_string();
    }
    if end.kind == PathEndKind::PathDelay {
        return PATH_DELAY_GROUP.to_string();
    }
    UNCONSTRAINED_GROUP.to_string()
}

// Keeps the worst end per (endpoint, kind, clock pair), collapsing
// rise/fall variants.
fn collapse_unique_pins(ends: Vec<PathEnd>) -> Vec<PathEnd> {
    let mut seen = HashSet::new();
    ends.into_iter()
        .filter(|end| {
            seen.insert((
                end.vertex,
                end.kind.cmp_key(),
                end.src_clk_edge.map(|e| e.clock),
                end.tgt_clk_edge.map(|e| e.clock),
            ))
        })
        .collect()
}

// Keeps the worst end per traversed edge sequence, ignoring transitions.
fn collapse_unique_edges(ends: Vec<PathEnd>, search: &Search, graph: &Graph) -> Vec<PathEnd> {
    let _ = graph;
    let mut seen: HashSet<Vec<EdgeId>> = HashSet::new();
    ends.into_iter()
        .filter(|end| {
            let mut edges = Vec::new();
            let mut cursor = search
                .paths
                .paths(end.vertex)
                .get(end.path_index as usize)
                .and_then(|p| p.prev);
            while let Some(prev) = cursor {
                edges.push(prev.edge);
                cursor = search.paths.path(prev.path).and_then(|p| p.prev);
            }
            seen.insert(edges)
        })
        .collect()
}

fn limit_per_endpoint(ends: Vec<PathEnd>, limit: usize) -> Vec<PathEnd> {
    let mut counts: HashMap<VertexId, usize> = HashMap::new();
    ends.into_iter()
        .filter(|end| {
            let count = counts.entry(end.vertex).or_insert(0);
            *count += 1;
            *count <= limit
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronos_common::MinMax;

    fn end(vertex: u32, kind: PathEndKind, slack: f64) -> PathEnd {
        PathEnd {
            vertex: VertexId::from_raw(vertex),
            path_index: 0,
            kind,
            min_max: match kind {
                PathEndKind::Hold | PathEndKind::Removal | PathEndKind::GatedClockHold => {
                    MinMax::Min
                }
                _ => MinMax::Max,
            },
            arrival: 0.0,
            required: Some(slack),
            slack: Some(slack),
            margin: 0.0,
            crpr: 0.0,
            src_clk_edge: None,
            tgt_clk_edge: None,
            exception: None,
            group_path: None,
        }
    }

    #[test]
    fn spec_slack_window() {
        let spec = ReportSpec {
            slack_max: 0.0,
            ..ReportSpec::default()
        };
        assert!(spec.admits(&end(0, PathEndKind::Setup, -1.0)));
        assert!(!spec.admits(&end(0, PathEndKind::Setup, 1.0)));
    }

    #[test]
    fn spec_kind_filters() {
        let spec = ReportSpec {
            hold: false,
            ..ReportSpec::default()
        };
        assert!(spec.admits(&end(0, PathEndKind::Setup, 0.0)));
        assert!(!spec.admits(&end(0, PathEndKind::Hold, 0.0)));
        let spec = ReportSpec {
            recovery: false,
            ..ReportSpec::default()
        };
        assert!(!spec.admits(&end(0, PathEndKind::Recovery, 0.0)));
    }

    #[test]
    fn unconstrained_needs_opt_in() {
        let spec = ReportSpec::default();
        let mut unconstrained = end(0, PathEndKind::Unconstrained, 0.0);
        unconstrained.slack = None;
        unconstrained.required = None;
        assert!(!spec.admits(&unconstrained));
        let spec = ReportSpec {
            unconstrained: true,
            ..ReportSpec::default()
        };
        assert!(spec.admits(&unconstrained));
    }

    #[test]
    fn limit_per_endpoint_keeps_worst() {
        let ends = vec![
            end(0, PathEndKind::Setup, -2.0),
            end(0, PathEndKind::Setup, -1.0),
            end(1, PathEndKind::Setup, 0.5),
        ];
        let kept = limit_per_endpoint(ends, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].slack, Some(-2.0));
        assert_eq!(kept[1].vertex, VertexId::from_raw(1));
    }

    #[test]
    fn collapse_unique_pins_dedupes_rf_variants() {
        // Two ends at the same endpoint with the same kind and clocks:
        // the rise/fall pair collapses to the worst.
        let ends = vec![
            end(0, PathEndKind::Setup, -1.0),
            end(0, PathEndKind::Setup, -0.5),
            end(0, PathEndKind::Hold, 0.2),
        ];
        let kept = collapse_unique_pins(ends);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].slack, Some(-1.0));
    }
}
