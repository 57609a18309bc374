//! SCC-aware topological levelisation with deterministic loop breaking.
//!
//! Combinational cycles are broken by marking one edge per cycle
//! `is_disabled_loop` rather than deleting it: the topology stays
//! inspectable and the disabling is reversible. The edge choice is
//! deterministic: prefer an edge into a register clock pin, otherwise the
//! lexicographically smallest (from pin name, to pin name) pair.

use crate::graph::{Graph, LevelColor, LEVEL_MAX};
use crate::ids::{EdgeId, VertexId};
use chronos_common::{ChronosResult, InternalError, Interner};
use chronos_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use chronos_netlist::Network;
use petgraph::graph::{DiGraph, NodeIndex};

/// Assigns topological levels, breaking combinational loops as needed.
///
/// A broken loop emits warning `G100`. Fails with an internal error if a
/// cycle survives breaking (which would indicate a bug) or if levels
/// overflow the level field.
pub fn levelize(
    graph: &mut Graph,
    network: &Network,
    interner: &Interner,
    sink: &DiagnosticSink,
) -> ChronosResult<()> {
    // Reset previous loop breaking and colours; breaking is recomputed
    // from scratch so that constraint edits can un-break loops.
    for edge_id in graph.edge_ids().collect::<Vec<_>>() {
        graph.edge_mut(edge_id).is_disabled_loop = false;
    }
    for vertex_id in graph.vertex_ids().collect::<Vec<_>>() {
        let vertex = graph.vertex_mut(vertex_id);
        vertex.color = LevelColor::White;
        vertex.level = 0;
    }

    break_loops(graph, network, interner, sink)?;
    assign_levels(graph)?;
    graph.levels_valid = true;
    Ok(())
}

// Repeatedly finds strongly connected components over the enabled edges
// and disables one edge per non-trivial SCC until the graph is acyclic.
fn break_loops(
    graph: &mut Graph,
    network: &Network,
    interner: &Interner,
    sink: &DiagnosticSink,
) -> ChronosResult<()> {
    // Self loops first; tarjan reports them as singleton SCCs.
    for edge_id in graph.edge_ids().collect::<Vec<_>>() {
        let edge = graph.edge(edge_id);
        if edge.from == edge.to && !edge.is_disabled() {
            disable_loop_edge(graph, edge_id, network, interner, sink);
        }
    }

    let mut attempts_left = graph.edge_count() + 1;
    loop {
        let mut scc_graph: DiGraph<VertexId, EdgeId> = DiGraph::new();
        let nodes: Vec<NodeIndex> = graph
            .vertex_ids()
            .map(|v| scc_graph.add_node(v))
            .collect();
        for edge_id in graph.edge_ids() {
            let edge = graph.edge(edge_id);
            if !edge.is_disabled() {
                scc_graph.add_edge(
                    nodes[edge.from.as_usize()],
                    nodes[edge.to.as_usize()],
                    edge_id,
                );
            }
        }
        let sccs = petgraph::algo::tarjan_scc(&scc_graph);
        let mut broke_any = false;
        for scc in sccs {
            if scc.len() < 2 {
                continue;
            }
            let members: Vec<VertexId> = scc.iter().map(|&n| scc_graph[n]).collect();
            let candidates: Vec<EdgeId> = graph
                .edge_ids()
                .filter(|&e| {
                    let edge = graph.edge(e);
                    !edge.is_disabled()
                        && members.contains(&edge.from)
                        && members.contains(&edge.to)
                })
                .collect();
            if let Some(victim) = choose_loop_edge(graph, network, interner, &candidates) {
                disable_loop_edge(graph, victim, network, interner, sink);
                broke_any = true;
            }
        }
        if !broke_any {
            return Ok(());
        }
        attempts_left -= 1;
        if attempts_left == 0 {
            return Err(InternalError::new(900, "combinational loop could not be broken"));
        }
    }
}

// Prefer an edge whose destination is a register clock; never break a data
// path when a clock edge is available. Otherwise the lexicographically
// smallest (from pin name, to pin name).
fn choose_loop_edge(
    graph: &Graph,
    network: &Network,
    interner: &Interner,
    candidates: &[EdgeId],
) -> Option<EdgeId> {
    let edge_names = |e: EdgeId| {
        let edge = graph.edge(e);
        let from = interner.resolve(network.pin(graph.vertex(edge.from).pin).name);
        let to = interner.resolve(network.pin(graph.vertex(edge.to).pin).name);
        (from, to)
    };
    let clk_edges: Vec<EdgeId> = candidates
        .iter()
        .copied()
        .filter(|&e| graph.vertex(graph.edge(e).to).is_reg_clk)
        .collect();
    let pool = if clk_edges.is_empty() {
        candidates
    } else {
        clk_edges.as_slice()
    };
    pool.iter().copied().min_by_key(|&e| edge_names(e))
}

fn disable_loop_edge(
    graph: &mut Graph,
    edge_id: EdgeId,
    network: &Network,
    interner: &Interner,
    sink: &DiagnosticSink,
) {
    graph.edge_mut(edge_id).is_disabled_loop = true;
    let edge = graph.edge(edge_id);
    let from = interner.resolve(network.pin(graph.vertex(edge.from).pin).name);
    let to = interner.resolve(network.pin(graph.vertex(edge.to).pin).name);
    sink.emit(
        Diagnostic::warning(
            DiagnosticCode::new(Category::Graph, 100),
            format!("breaking timing loop at edge {from} -> {to}"),
        )
        .with_object(format!("{from} -> {to}")),
    );
}

// Iterative DFS over fanin assigning level = 1 + max(fanin level). A gray
// fanin means a cycle survived loop breaking.
fn assign_levels(graph: &mut Graph) -> ChronosResult<()> {
    let mut max_level = 0;
    for root in graph.vertex_ids().collect::<Vec<_>>() {
        if graph.vertex(root).color != LevelColor::White {
            continue;
        }
        let mut stack: Vec<(VertexId, bool)> = vec![(root, false)];
        while let Some((vertex, expanded)) = stack.pop() {
            if expanded {
                let mut level = 0;
                for edge in graph.in_edges(vertex) {
                    if edge.is_disabled() {
                        continue;
                    }
                    let fanin_level = graph.vertex(edge.from).level;
                    level = level.max(fanin_level + 1);
                }
                if level > LEVEL_MAX {
                    return Err(InternalError::new(901, "topological level overflow"));
                }
                max_level = max_level.max(level);
                let v = graph.vertex_mut(vertex);
                v.level = level;
                v.color = LevelColor::Black;
                continue;
            }
            match graph.vertex(vertex).color {
                LevelColor::Black => continue,
                LevelColor::Gray => {
                    return Err(InternalError::new(
                        900,
                        "cycle encountered after loop breaking",
                    ));
                }
                LevelColor::White => {}
            }
            graph.vertex_mut(vertex).color = LevelColor::Gray;
            stack.push((vertex, true));
            let fanin: Vec<VertexId> = graph
                .in_edges(vertex)
                .filter(|e| !e.is_disabled())
                .map(|e| e.from)
                .collect();
            for from in fanin {
                if graph.vertex(from).color == LevelColor::White {
                    stack.push((from, false));
                }
            }
        }
    }
    graph.max_level = max_level;
    Ok(())
}

/// Groups vertex ids by level, id-ordered within each level. The delay
/// calculator and searches iterate these groups with a barrier per level.
pub fn vertices_by_level(graph: &Graph) -> Vec<Vec<VertexId>> {
    let mut levels: Vec<Vec<VertexId>> = vec![Vec::new(); graph.max_level as usize + 1];
    for vertex_id in graph.vertex_ids() {
        levels[graph.vertex(vertex_id).level as usize].push(vertex_id);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeKind;
    use chronos_netlist::{NetId, PinId, PortDirection, TimingRole, TimingSense};

    // A bare network with one named pin per graph vertex so the loop
    // breaker can resolve names.
    fn network_with_pins(interner: &Interner, names: &[&str]) -> (Network, Vec<PinId>) {
        let mut network = Network::new();
        let pins = names
            .iter()
            .map(|n| network.make_top_port(interner.get_or_intern(n), PortDirection::Input))
            .collect();
        (network, pins)
    }

    fn wire(graph: &mut Graph, from: VertexId, to: VertexId) -> EdgeId {
        graph.make_edge(
            from,
            to,
            EdgeKind::Wire {
                net: NetId::from_raw(0),
            },
            TimingRole::Wire,
            TimingSense::PositiveUnate,
            2,
        )
    }

    #[test]
    fn chain_levels() {
        let interner = Interner::new();
        let (network, pins) = network_with_pins(&interner, &["a", "b", "c"]);
        let mut graph = Graph::new(2, 1);
        let a = graph.make_vertex(pins[0], false, false);
        let b = graph.make_vertex(pins[1], false, false);
        let c = graph.make_vertex(pins[2], false, false);
        wire(&mut graph, a, b);
        wire(&mut graph, b, c);
        let sink = DiagnosticSink::new();
        levelize(&mut graph, &network, &interner, &sink).unwrap();
        assert_eq!(graph.vertex(a).level, 0);
        assert_eq!(graph.vertex(b).level, 1);
        assert_eq!(graph.vertex(c).level, 2);
        assert_eq!(graph.max_level, 2);
        assert!(graph.levels_valid);
    }

    #[test]
    fn diamond_levels() {
        let interner = Interner::new();
        let (network, pins) = network_with_pins(&interner, &["a", "b", "c", "d"]);
        let mut graph = Graph::new(2, 1);
        let vs: Vec<VertexId> = pins
            .iter()
            .map(|&p| graph.make_vertex(p, false, false))
            .collect();
        wire(&mut graph, vs[0], vs[1]);
        wire(&mut graph, vs[0], vs[2]);
        wire(&mut graph, vs[1], vs[3]);
        wire(&mut graph, vs[2], vs[3]);
        let sink = DiagnosticSink::new();
        levelize(&mut graph, &network, &interner, &sink).unwrap();
        assert_eq!(graph.vertex(vs[3]).level, 2);
    }

    #[test]
    fn two_inverter_loop_broken() {
        let interner = Interner::new();
        let (network, pins) = network_with_pins(&interner, &["a", "b"]);
        let mut graph = Graph::new(2, 1);
        let a = graph.make_vertex(pins[0], false, false);
        let b = graph.make_vertex(pins[1], false, false);
        let e_ab = wire(&mut graph, a, b);
        let e_ba = wire(&mut graph, b, a);
        let sink = DiagnosticSink::new();
        levelize(&mut graph, &network, &interner, &sink).unwrap();
        // Exactly one of the two edges is loop-disabled; the smaller
        // (from, to) name pair ("a", "b") is chosen.
        assert!(graph.edge(e_ab).is_disabled_loop);
        assert!(!graph.edge(e_ba).is_disabled_loop);
        // Warning emitted with the stable code.
        let diags = sink.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(format!("{}", diags[0].code), "G100");
        // Levels satisfy the invariant on the surviving edge.
        assert!(graph.vertex(a).level >= graph.vertex(b).level + 1);
    }

    #[test]
    fn loop_break_prefers_reg_clk_edge() {
        let interner = Interner::new();
        let (network, pins) = network_with_pins(&interner, &["a", "b", "zclk"]);
        let mut graph = Graph::new(2, 1);
        let a = graph.make_vertex(pins[0], false, false);
        let b = graph.make_vertex(pins[1], false, false);
        let clk = graph.make_vertex(pins[2], false, true);
        // Cycle a -> b -> clk -> a; the edge into the reg clock wins even
        // though its names sort last.
        wire(&mut graph, a, b);
        let e_into_clk = wire(&mut graph, b, clk);
        wire(&mut graph, clk, a);
        let sink = DiagnosticSink::new();
        levelize(&mut graph, &network, &interner, &sink).unwrap();
        assert!(graph.edge(e_into_clk).is_disabled_loop);
    }

    #[test]
    fn self_loop_disabled() {
        let interner = Interner::new();
        let (network, pins) = network_with_pins(&interner, &["a"]);
        let mut graph = Graph::new(2, 1);
        let a = graph.make_vertex(pins[0], false, false);
        let e = wire(&mut graph, a, a);
        let sink = DiagnosticSink::new();
        levelize(&mut graph, &network, &interner, &sink).unwrap();
        assert!(graph.edge(e).is_disabled_loop);
        assert_eq!(graph.vertex(a).level, 0);
    }

    #[test]
    fn level_invariant_over_all_edges() {
        let interner = Interner::new();
        let (network, pins) = network_with_pins(&interner, &["a", "b", "c", "d"]);
        let mut graph = Graph::new(2, 1);
        let vs: Vec<VertexId> = pins
            .iter()
            .map(|&p| graph.make_vertex(p, false, false))
            .collect();
        wire(&mut graph, vs[0], vs[1]);
        wire(&mut graph, vs[1], vs[2]);
        wire(&mut graph, vs[2], vs[3]);
        wire(&mut graph, vs[3], vs[1]); // back edge
        let sink = DiagnosticSink::new();
        levelize(&mut graph, &network, &interner, &sink).unwrap();
        for edge_id in graph.edge_ids() {
            let edge = graph.edge(edge_id);
            assert!(
                edge.is_disabled_loop
                    || graph.vertex(edge.to).level >= graph.vertex(edge.from).level + 1,
                "level invariant violated"
            );
        }
    }

    #[test]
    fn vertices_by_level_groups() {
        let interner = Interner::new();
        let (network, pins) = network_with_pins(&interner, &["a", "b", "c"]);
        let mut graph = Graph::new(2, 1);
        let a = graph.make_vertex(pins[0], false, false);
        let b = graph.make_vertex(pins[1], false, false);
        let c = graph.make_vertex(pins[2], false, false);
        wire(&mut graph, a, c);
        wire(&mut graph, b, c);
        let sink = DiagnosticSink::new();
        levelize(&mut graph, &network, &interner, &sink).unwrap();
        let levels = vertices_by_level(&graph);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0], vec![a, b]);
        assert_eq!(levels[1], vec![c]);
    }
}
