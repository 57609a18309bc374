//! Report data: expanded paths and design-level summaries.
//!
//! The human-facing renderer is an external collaborator; these types
//! carry everything it needs to reconstruct a delay report: the step
//! sequence of a path with incremental delays, and the per-pole summary
//! numbers.

use chronos_common::{MinMax, RiseFall, Slack};
use chronos_graph::Graph;
use chronos_search::{PathEnd, PathRef, Search};
use serde::{Deserialize, Serialize};

/// One step of an expanded path, startpoint first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathStep {
    /// Full path name of the pin at this step.
    pub pin: String,
    /// Transition at the pin.
    pub rf: RiseFall,
    /// Arrival time at the pin.
    pub arrival: f64,
    /// Delay increment from the previous step.
    pub incr: f64,
}

/// Expands a path end into its step sequence by walking the prev links
/// back to the startpoint.
pub fn expand_path(
    end: &PathEnd,
    search: &Search,
    graph: &Graph,
    network: &chronos_netlist::Network,
    interner: &chronos_common::Interner,
) -> Vec<PathStep> {
    let mut steps = Vec::new();
    let mut cursor = Some(PathRef {
        vertex: end.vertex,
        index: end.path_index,
    });
    while let Some(path_ref) = cursor {
        let Some(path) = search.paths.path(path_ref) else {
            break;
        };
        let tag = search.tag_db.tag(path.tag);
        let pin = graph.vertex(path_ref.vertex).pin;
        steps.push(PathStep {
            pin: interner.resolve(network.pin(pin).name).to_string(),
            rf: tag.rf,
            arrival: path.arrival,
            incr: 0.0,
        });
        cursor = path.prev.map(|p| p.path);
    }
    steps.reverse();
    for i in 1..steps.len() {
        steps[i].incr = steps[i].arrival - steps[i - 1].arrival;
    }
    steps
}

/// Design-level timing summary for one analysis pole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSummary {
    /// The pole summarised.
    pub min_max: MinMax,
    /// Worst endpoint slack, if any endpoint is constrained.
    pub worst_slack: Option<Slack>,
    /// Sum of negative endpoint slacks.
    pub total_negative_slack: Slack,
    /// Number of timing endpoints.
    pub endpoint_count: usize,
    /// True when no endpoint violates.
    pub met: bool,
}

impl TimingSummary {
    /// Builds the summary for one pole from the search state.
    pub fn make(
        min_max: MinMax,
        search: &Search,
        graph: &Graph,
        ctx: &chronos_search::SearchContext<'_>,
    ) -> Self {
        let worst = search.worst_slack(min_max, graph, ctx);
        let tns = search.total_negative_slack(min_max, graph, ctx);
        Self {
            min_max,
            worst_slack: worst.map(|(slack, _)| slack),
            total_negative_slack: tns,
            endpoint_count: search.endpoints().len(),
            met: worst.map_or(true, |(slack, _)| slack >= 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_serde_roundtrip() {
        let summary = TimingSummary {
            min_max: MinMax::Max,
            worst_slack: Some(-0.3),
            total_negative_slack: -0.3,
            endpoint_count: 4,
            met: false,
        };
        let json = serde_json::to_string(&summary).unwrap();
        let back: TimingSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.worst_slack, Some(-0.3));
        assert!(!back.met);
        assert_eq!(back.endpoint_count, 4);
    }

    #[test]
    fn step_incr_is_zero_for_head() {
        let step = PathStep {
            pin: "u1/A".to_string(),
            rf: RiseFall::Rise,
            arrival: 0.0,
            incr: 0.0,
        };
        assert_eq!(step.incr, 0.0);
    }
}
