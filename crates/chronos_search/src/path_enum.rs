//! Lazy k-best path enumeration per endpoint.
//!
//! The searches retain only the single worst path per tag at each vertex.
//! To report the k worst paths to an endpoint, enumeration walks the worst
//! path's prev links and, at each vertex, scores the alternative incoming
//! (edge, arc, from-path) choices that merge into the same tag. Each
//! diversion is a complete path: the alternative prefix plus the original
//! suffix, worse than the original by the arrival difference at the
//! diversion point. Diversions are expanded best-first from a heap;
//! diverted prefixes are materialised as `is_enum` records so nested
//! expansion never re-expands them.

use crate::path::{Path, PathRef, PrevPath};
use crate::path_end::PathEnd;
use crate::search::{edge_arcs, Search, SearchContext};
use chronos_common::MinMax;
use chronos_graph::Graph;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

// A reference either into the real path store or into the enumeration's
// private overlay of diverted prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnumRef {
    Store(PathRef),
    Overlay(usize),
}

struct Overlay {
    records: Vec<(Path, chronos_graph::VertexId, Option<EnumRef>)>,
}

impl Overlay {
    fn resolve<'a>(
        &'a self,
        search: &'a Search,
        path_ref: EnumRef,
    ) -> Option<(&'a Path, chronos_graph::VertexId, Option<EnumRef>)> {
        match path_ref {
            EnumRef::Store(store_ref) => {
                let path = search.paths.path(store_ref)?;
                if path.is_enum {
                    return None;
                }
                Some((
                    path,
                    store_ref.vertex,
                    path.prev.map(|p| EnumRef::Store(p.path)),
                ))
            }
            EnumRef::Overlay(index) => {
                let (path, vertex, prev) = &self.records[index];
                Some((path, *vertex, *prev))
            }
        }
    }
}

// A candidate path in the heap, ordered worst-slack-first.
struct Candidate {
    slack: f64,
    head: EnumRef,
    // Positions below this (counting from the endpoint) may not divert
    // again, preventing duplicate enumeration.
    div_floor: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.slack == other.slack
    }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the smallest slack pops
        // first.
        other
            .slack
            .partial_cmp(&self.slack)
            .unwrap_or(Ordering::Equal)
    }
}

/// Enumerates up to `count` path ends for one endpoint end, worst first.
/// The first element is the original end itself.
pub fn enumerate_path_ends(
    search: &Search,
    graph: &Graph,
    ctx: &SearchContext<'_>,
    end: &PathEnd,
    count: usize,
) -> Vec<PathEnd> {
    let Some(end_slack) = end.slack else {
        return vec![end.clone()];
    };
    let head = EnumRef::Store(PathRef {
        vertex: end.vertex,
        index: end.path_index,
    });
    let mut overlay = Overlay {
        records: Vec::new(),
    };
    let mut heap = BinaryHeap::new();
    heap.push(Candidate {
        slack: end_slack,
        head,
        div_floor: 0,
    });

    let mut results = Vec::new();
    while results.len() < count {
        let Some(candidate) = heap.pop() else {
            break;
        };
        let mut reported = end.clone();
        reported.slack = Some(candidate.slack);
        let delta = match end.min_max {
            MinMax::Max => end_slack - candidate.slack,
            MinMax::Min => candidate.slack - end_slack,
        };
        reported.arrival = end.arrival + delta;
        results.push(reported);
        push_diversions(
            search,
            graph,
            ctx,
            &mut overlay,
            &mut heap,
            &candidate,
            end.min_max,
        );
    }
    results
}

// Scores every alternative prefix of `candidate` and pushes the resulting
// complete paths onto the heap.
#[allow(clippy::too_many_arguments)]
fn push_diversions(
    search: &Search,
    graph: &Graph,
    ctx: &SearchContext<'_>,
    overlay: &mut Overlay,
    heap: &mut BinaryHeap<Candidate>,
    candidate: &Candidate,
    min_max: MinMax,
) {
    // Walk the candidate chain from the endpoint toward the start.
    let mut position = 0usize;
    let mut cursor = Some(candidate.head);
    while let Some(current) = cursor {
        let Some((path, vertex, prev)) = overlay.resolve(search, current) else {
            break;
        };
        let tag_id = path.tag;
        let arrival = path.arrival;
        let chosen_prev = match current {
            EnumRef::Store(store_ref) => search.paths.path(store_ref).and_then(|p| p.prev),
            EnumRef::Overlay(index) => match &overlay.records[index].0.prev {
                Some(p) => Some(*p),
                None => None,
            },
        };
        cursor = prev;

        if position < candidate.div_floor {
            position += 1;
            continue;
        }
        let tag = search.tag_db.tag(tag_id);

        for edge in graph.in_edges(vertex) {
            if edge.role.is_check() || edge.is_disabled() {
                continue;
            }
            let from_paths = search.paths.paths(edge.from);
            for (from_idx, from_path) in from_paths.iter().enumerate() {
                if from_path.is_enum {
                    continue;
                }
                let from_tag = search.tag_db.tag(from_path.tag);
                for (arc_idx, from_rf, to_rf) in edge_arcs(ctx, edge) {
                    if from_rf != from_tag.rf || to_rf != tag.rf {
                        continue;
                    }
                    let from_ref = PathRef {
                        vertex: edge.from,
                        index: from_idx as u32,
                    };
                    let is_chosen = chosen_prev.is_some_and(|p| {
                        p.path == from_ref && p.edge == edge.id && p.arc_idx == arc_idx as u8
                    });
                    if is_chosen {
                        continue;
                    }
                    let Some(to_tag) =
                        search.thru_tag(graph, ctx, &from_tag, from_ref, edge, to_rf)
                    else {
                        continue;
                    };
                    if to_tag != tag_id {
                        continue;
                    }
                    let ap = ctx.aps[from_tag.ap_index];
                    let delay = search.derated_delay(
                        graph,
                        ctx,
                        edge,
                        arc_idx,
                        from_tag.is_clk,
                        to_rf,
                        ap,
                    );
                    let alt_arrival = from_path.arrival + delay;
                    // How much less critical the alternative prefix is;
                    // the diverted path's slack grows by this amount.
                    let worsening = match min_max {
                        MinMax::Max => arrival - alt_arrival,
                        MinMax::Min => alt_arrival - arrival,
                    };
                    if worsening < 0.0 {
                        continue;
                    }
                    // Materialise the diverted record; it never expands
                    // again through the store.
                    let diverted = Path {
                        tag: tag_id,
                        arrival: alt_arrival,
                        required: None,
                        prev: Some(PrevPath {
                            path: from_ref,
                            edge: edge.id,
                            arc_idx: arc_idx as u8,
                        }),
                        is_enum: true,
                    };
                    let overlay_index = overlay.records.len();
                    overlay
                        .records
                        .push((diverted, vertex, Some(EnumRef::Store(from_ref))));
                    heap.push(Candidate {
                        slack: candidate.slack + worsening,
                        head: if position == 0 {
                            EnumRef::Overlay(overlay_index)
                        } else {
                            // The diversion replaces the prefix at this
                            // position; the suffix arrival shift is the
                            // same for the endpoint, so the head stays
                            // and only the score moves.
                            candidate.head
                        },
                        div_floor: position + 1,
                    });
                }
            }
        }
        position += 1;
    }
}
