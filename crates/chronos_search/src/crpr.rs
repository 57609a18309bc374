//! Clock reconvergence pessimism removal.
//!
//! When a check's launch and capture clock paths share a prefix of the
//! clock tree, the min/max spread of that shared prefix is counted against
//! the check twice. The credit returned here is the spread of the clock
//! arrival at the deepest common vertex of the two clock paths.

use crate::path::{PathRef, PathStore};
use crate::search::{Search, SearchContext};
use chronos_common::{MinMax, RiseFall};
use chronos_graph::{Graph, VertexId};
use chronos_sdc::{ClockEdge, CrprMode};

// Walks a clock path back to its seed, collecting (vertex, transition).
fn clk_path_chain(paths: &PathStore, db: &crate::tag::TagDb, head: PathRef) -> Vec<(VertexId, RiseFall)> {
    let mut chain = Vec::new();
    let mut cursor = Some(head);
    while let Some(path_ref) = cursor {
        let Some(path) = paths.path(path_ref) else {
            break;
        };
        let tag = db.tag(path.tag);
        chain.push((path_ref.vertex, tag.rf));
        cursor = path.prev.map(|p| p.path);
    }
    chain
}

// The min/max spread of clock arrivals at a vertex for one clock edge.
fn clk_spread(
    search: &Search,
    vertex: VertexId,
    rf: RiseFall,
    clk_edge: ClockEdge,
    same_transition: bool,
) -> f64 {
    let mut early: Option<f64> = None;
    let mut late: Option<f64> = None;
    for path in search.paths.paths(vertex) {
        let tag = search.tag_db.tag(path.tag);
        if !tag.is_clk {
            continue;
        }
        if same_transition && tag.rf != rf {
            continue;
        }
        let info = search.tag_db.clk_info(tag.clk_info);
        if info.clk_edge != Some(clk_edge) {
            continue;
        }
        match tag.min_max {
            MinMax::Min => {
                early = Some(early.map_or(path.arrival, |e: f64| e.min(path.arrival)));
            }
            MinMax::Max => {
                late = Some(late.map_or(path.arrival, |l: f64| l.max(path.arrival)));
            }
        }
    }
    match (early, late) {
        (Some(early), Some(late)) => (late - early).max(0.0),
        _ => 0.0,
    }
}

/// The CRPR credit for a (launch, capture) clock path pair.
///
/// `launch_prefix` is the launch path's clock prefix recorded at the
/// launch point; `capture_path` is the capture clock path at the check
/// clock vertex. Returns zero when CRPR is disabled, when the paths share
/// no vertex, or when the clocks differ.
pub fn crpr_credit(
    search: &Search,
    graph: &Graph,
    ctx: &SearchContext<'_>,
    launch_prefix: Option<PathRef>,
    capture_path: PathRef,
) -> f64 {
    if ctx.sdc.crpr_mode == CrprMode::Disabled {
        return 0.0;
    }
    let Some(launch_prefix) = launch_prefix else {
        return 0.0;
    };
    let _ = graph;

    let capture_tag = match search.paths.path(capture_path) {
        Some(path) => search.tag_db.tag(path.tag),
        None => return 0.0,
    };
    let Some(capture_edge) = search.tag_db.clk_info(capture_tag.clk_info).clk_edge else {
        return 0.0;
    };
    let launch_tag = match search.paths.path(launch_prefix) {
        Some(path) => search.tag_db.tag(path.tag),
        None => return 0.0,
    };
    let Some(launch_edge) = search.tag_db.clk_info(launch_tag.clk_info).clk_edge else {
        return 0.0;
    };
    // Shared pessimism requires a shared clock source.
    if launch_edge.clock != capture_edge.clock {
        return 0.0;
    }

    let launch_chain = clk_path_chain(&search.paths, &search.tag_db, launch_prefix);
    let capture_chain = clk_path_chain(&search.paths, &search.tag_db, capture_path);
    let same_transition = ctx.sdc.crpr_mode == CrprMode::SameTransition;

    // Deepest common vertex: the first vertex of the capture chain
    // (walking from the check clock back toward the source) that the
    // launch chain also visits.
    for &(vertex, rf) in &capture_chain {
        let on_launch = launch_chain.iter().any(|&(v, launch_rf)| {
            v == vertex && (!same_transition || launch_rf == rf)
        });
        if on_launch {
            return clk_spread(search, vertex, rf, capture_edge, same_transition);
        }
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use crate::tag::{ClkInfo, Tag};
    use chronos_sdc::ClockId;

    // Builds a search whose vertex 0 carries min/max clock arrivals for
    // one clock edge, as the common-point spread lookup expects.
    fn search_with_clk_arrivals(early: f64, late: f64) -> (Search, ClockEdge) {
        let mut search = Search::new();
        search.paths.resize(4);
        let edge = ClockEdge::new(ClockId::from_raw(0), RiseFall::Rise);
        let mut mk = |min_max: MinMax, arrival: f64| {
            let mut info = ClkInfo::unclocked(min_max);
            info.clk_edge = Some(edge);
            let clk_info = search.tag_db.intern_clk_info(info);
            let tag = search.tag_db.intern_tag(Tag {
                rf: RiseFall::Rise,
                min_max,
                ap_index: min_max.index(),
                clk_info,
                is_clk: true,
                input_delay: None,
                is_segment_start: false,
                states: Vec::new(),
            });
            Path::head(tag, arrival)
        };
        let paths = vec![mk(MinMax::Min, early), mk(MinMax::Max, late)];
        search.paths.make_paths(VertexId::from_raw(0), paths);
        (search, edge)
    }

    #[test]
    fn spread_is_late_minus_early() {
        let (search, edge) = search_with_clk_arrivals(0.20, 0.24);
        let spread = clk_spread(&search, VertexId::from_raw(0), RiseFall::Rise, edge, false);
        assert!((spread - 0.04).abs() < 1e-12);
    }

    #[test]
    fn spread_zero_without_both_poles() {
        let mut search = Search::new();
        search.paths.resize(1);
        let edge = ClockEdge::new(ClockId::from_raw(0), RiseFall::Rise);
        assert_eq!(
            clk_spread(&search, VertexId::from_raw(0), RiseFall::Rise, edge, false),
            0.0
        );
    }

    #[test]
    fn same_transition_filters_other_rf() {
        let (search, edge) = search_with_clk_arrivals(0.1, 0.3);
        // Arrivals are rise paths; asking for fall under same-transition
        // finds nothing.
        assert_eq!(
            clk_spread(&search, VertexId::from_raw(0), RiseFall::Fall, edge, true),
            0.0
        );
        assert!(
            (clk_spread(&search, VertexId::from_raw(0), RiseFall::Fall, edge, false) - 0.2).abs()
                < 1e-12
        );
    }

    #[test]
    fn chain_walk_follows_prev_links() {
        let mut search = Search::new();
        search.paths.resize(3);
        let clk_info = search.tag_db.intern_clk_info(ClkInfo::unclocked(MinMax::Max));
        let tag = search.tag_db.intern_tag(Tag {
            rf: RiseFall::Rise,
            min_max: MinMax::Max,
            ap_index: 0,
            clk_info,
            is_clk: true,
            input_delay: None,
            is_segment_start: false,
            states: Vec::new(),
        });
        search
            .paths
            .make_paths(VertexId::from_raw(0), vec![Path::head(tag, 0.0)]);
        let mut mid = Path::head(tag, 0.1);
        mid.prev = Some(crate::path::PrevPath {
            path: PathRef {
                vertex: VertexId::from_raw(0),
                index: 0,
            },
            edge: chronos_graph::EdgeId::from_raw(0),
            arc_idx: 0,
        });
        search.paths.make_paths(VertexId::from_raw(1), vec![mid]);
        let chain = clk_path_chain(
            &search.paths,
            &search.tag_db,
            PathRef {
                vertex: VertexId::from_raw(1),
                index: 0,
            },
        );
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].0, VertexId::from_raw(1));
        assert_eq!(chain[1].0, VertexId::from_raw(0));
    }
}
