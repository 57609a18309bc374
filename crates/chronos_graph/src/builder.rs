//! Graph construction from the linked network and library.

use crate::graph::{Graph, EdgeKind};
use crate::ids::VertexId;
use chronos_common::LogicValue;
use chronos_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use chronos_netlist::{Library, Network, PinKind, PortDirection, TimingRole, TimingSense};

/// Builds the timing graph for a linked design.
///
/// One vertex per leaf pin, plus a driver vertex for bidirect pins; gate
/// edges from the cells' timing arc sets (conditional arcs simplified
/// against constants); wire edges from each net driver to each load.
/// Isolated nets are skipped. Register clock pins are marked from library
/// annotations; hierarchical pins are traversed transparently by virtue of
/// nets listing leaf pins.
pub fn build_graph(
    network: &Network,
    library: &Library,
    sink: &DiagnosticSink,
    slew_rf_count: usize,
    ap_count: usize,
) -> Graph {
    let mut graph = Graph::new(slew_rf_count, ap_count);
    make_pin_vertices(&mut graph, network, library);
    make_instance_edges(&mut graph, network, library, sink);
    make_wire_edges(&mut graph, network, library);
    mark_downstream_clk_pins(&mut graph);
    graph
}

fn make_pin_vertices(graph: &mut Graph, network: &Network, library: &Library) {
    for pin in &network.pins {
        match &pin.kind {
            PinKind::Hierarchical { .. } => continue,
            PinKind::TopPort { .. } | PinKind::InstancePin { .. } => {
                let is_reg_clk = network
                    .pin_port(pin.id, library)
                    .is_some_and(|p| p.is_register_clk);
                graph.make_vertex(pin.id, false, is_reg_clk);
                let direction = match &pin.kind {
                    PinKind::TopPort { direction } => *direction,
                    _ => network
                        .pin_port(pin.id, library)
                        .map_or(PortDirection::Internal, |p| p.direction),
                };
                if direction == PortDirection::Bidirect {
                    graph.make_vertex(pin.id, true, false);
                }
            }
        }
    }
}

fn make_instance_edges(
    graph: &mut Graph,
    network: &Network,
    library: &Library,
    sink: &DiagnosticSink,
) {
    for instance in &network.instances {
        let cell = library.cell(instance.cell);
        for arc_set in &cell.arc_sets {
            let from_idx = arc_set.from_port.as_usize();
            let to_idx = arc_set.to_port.as_usize();
            let (Some(&from_pin), Some(&to_pin)) =
                (instance.pins.get(from_idx), instance.pins.get(to_idx))
            else {
                sink.emit(
                    Diagnostic::warning(
                        DiagnosticCode::new(Category::Input, 1),
                        "timing arc references a port with no pin on the instance",
                    )
                    .with_note("arc skipped"),
                );
                continue;
            };
            let Some(from_vertex) = graph.pin_load_vertex(from_pin) else {
                continue;
            };
            let Some(to_vertex) = (if arc_set.role.is_check() {
                graph.pin_load_vertex(to_pin)
            } else {
                graph.pin_drvr_vertex(to_pin)
            }) else {
                continue;
            };
            let edge = graph.make_edge(
                from_vertex,
                to_vertex,
                EdgeKind::Gate {
                    instance: instance.id,
                    cell: cell.id,
                    arc_set: arc_set.id,
                },
                arc_set.role,
                arc_set.sense,
                arc_set.arcs.len() as u32,
            );
            if let Some(condition) = &arc_set.condition {
                let value = condition.eval(&|port| {
                    instance
                        .pins
                        .get(port.as_usize())
                        .map_or(LogicValue::Unknown, |&p| network.constant_value(p))
                });
                if value == LogicValue::Zero {
                    graph.edge_mut(edge).is_disabled_cond = true;
                }
            }
            if arc_set.role.is_check() {
                graph.vertex_mut(from_vertex).is_check_clk = true;
                graph.vertex_mut(to_vertex).has_checks = true;
                // The checked pin of a clock-gating cell is its enable.
                if cell.is_clock_gate {
                    graph.vertex_mut(to_vertex).is_gated_clk_enable = true;
                }
            }
            let (from_load, from_drvr) = graph.pin_vertices(from_pin);
            if from_pin == to_pin && from_load.is_some() && from_drvr.is_some() {
                graph.edge_mut(edge).is_bidirect_inst_path = true;
            }
        }
    }
}

fn make_wire_edges(graph: &mut Graph, network: &Network, library: &Library) {
    for net in &network.nets {
        if network.net_is_isolated(net.id, library) {
            continue;
        }
        let drivers = network.net_drivers(net.id, library);
        let loads = network.net_loads(net.id, library);
        for &driver in &drivers {
            let Some(from_vertex) = graph.pin_drvr_vertex(driver) else {
                continue;
            };
            for &load in &loads {
                let Some(to_vertex) = graph.pin_load_vertex(load) else {
                    continue;
                };
                if from_vertex == to_vertex {
                    continue;
                }
                let edge = graph.make_edge(
                    from_vertex,
                    to_vertex,
                    EdgeKind::Wire { net: net.id },
                    TimingRole::Wire,
                    TimingSense::PositiveUnate,
                    2,
                );
                if driver == load {
                    graph.edge_mut(edge).is_bidirect_net_path = true;
                }
            }
        }
    }
}

// Walks backward from register clock vertices so search predicates can
// keep clock propagation alive through the clock network.
fn mark_downstream_clk_pins(graph: &mut Graph) {
    let mut worklist: Vec<VertexId> = graph.reg_clk_vertices.iter().copied().collect();
    while let Some(vertex) = worklist.pop() {
        if graph.vertex(vertex).has_downstream_clk_pin {
            continue;
        }
        graph.vertex_mut(vertex).has_downstream_clk_pin = true;
        let fanin: Vec<VertexId> = graph.in_edges(vertex).map(|e| e.from).collect();
        for from in fanin {
            if !graph.vertex(from).has_downstream_clk_pin {
                worklist.push(from);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronos_common::{Ident, Interner, RiseFall};
    use chronos_netlist::{
        ArcSetId, CellId, DelayModel, FuncExpr, LibertyCell, LibertyPort, PortId, TimingArc,
        TimingArcSet, Units,
    };

    fn port(
        idx: u32,
        name: Ident,
        direction: PortDirection,
        is_register_clk: bool,
    ) -> LibertyPort {
        LibertyPort {
            id: PortId::from_raw(idx),
            name,
            direction,
            capacitance: 0.01,
            is_register_clk,
            function: None,
            tristate_enable: None,
        }
    }

    fn comb_arcs(delay: f64) -> Vec<TimingArc> {
        RiseFall::ALL
            .into_iter()
            .map(|rf| TimingArc {
                from_rf: rf,
                to_rf: rf.opposite(),
                delay: DelayModel::Constant(delay),
                slew: Some(DelayModel::Constant(0.05)),
            })
            .collect()
    }

    // INV cell plus a DFF-like cell with a setup check.
    fn test_library(interner: &Interner) -> Library {
        let inv = LibertyCell {
            id: CellId::from_raw(0),
            name: interner.get_or_intern("INV_X1"),
            ports: vec![
                port(0, interner.get_or_intern("A"), PortDirection::Input, false),
                port(1, interner.get_or_intern("ZN"), PortDirection::Output, false),
            ],
            arc_sets: vec![TimingArcSet {
                id: ArcSetId::from_raw(0),
                from_port: PortId::from_raw(0),
                to_port: PortId::from_raw(1),
                role: TimingRole::Combinational,
                sense: TimingSense::NegativeUnate,
                condition: None,
                arcs: comb_arcs(0.2),
            }],
            sequentials: vec![],
            is_clock_gate: false,
        };
        let dff = LibertyCell {
            id: CellId::from_raw(1),
            name: interner.get_or_intern("DFF_X1"),
            ports: vec![
                port(0, interner.get_or_intern("CK"), PortDirection::Input, true),
                port(1, interner.get_or_intern("D"), PortDirection::Input, false),
                port(2, interner.get_or_intern("Q"), PortDirection::Output, false),
            ],
            arc_sets: vec![
                TimingArcSet {
                    id: ArcSetId::from_raw(0),
                    from_port: PortId::from_raw(0),
                    to_port: PortId::from_raw(2),
                    role: TimingRole::RegClkToQ,
                    sense: TimingSense::NonUnate,
                    condition: None,
                    arcs: vec![TimingArc {
                        from_rf: RiseFall::Rise,
                        to_rf: RiseFall::Rise,
                        delay: DelayModel::Constant(0.5),
                        slew: Some(DelayModel::Constant(0.05)),
                    }],
                },
                TimingArcSet {
                    id: ArcSetId::from_raw(1),
                    from_port: PortId::from_raw(0),
                    to_port: PortId::from_raw(1),
                    role: TimingRole::Setup,
                    sense: TimingSense::NonUnate,
                    condition: None,
                    arcs: vec![TimingArc {
                        from_rf: RiseFall::Rise,
                        to_rf: RiseFall::Rise,
                        delay: DelayModel::Constant(0.2),
                        slew: None,
                    }],
                },
            ],
            sequentials: vec![],
            is_clock_gate: false,
        };
        Library {
            name: interner.get_or_intern("lib"),
            units: Units::default(),
            cells: vec![inv, dff],
        }
    }

    fn inv_instance(
        network: &mut Network,
        interner: &Interner,
        name: &str,
    ) -> chronos_netlist::InstanceId {
        network.make_instance(
            interner.get_or_intern(name),
            CellId::from_raw(0),
            vec![
                interner.get_or_intern(&format!("{name}/A")),
                interner.get_or_intern(&format!("{name}/ZN")),
            ],
        )
    }

    #[test]
    fn inverter_chain_graph() {
        let interner = Interner::new();
        let library = test_library(&interner);
        let mut network = Network::new();
        let inp = network.make_top_port(interner.get_or_intern("in"), PortDirection::Input);
        let out = network.make_top_port(interner.get_or_intern("out"), PortDirection::Output);
        let u1 = inv_instance(&mut network, &interner, "u1");
        let u2 = inv_instance(&mut network, &interner, "u2");
        let n_in = network.make_net(interner.get_or_intern("n_in"));
        let n_mid = network.make_net(interner.get_or_intern("n_mid"));
        let n_out = network.make_net(interner.get_or_intern("n_out"));
        let u1_pins = network.instance(u1).pins.clone();
        let u2_pins = network.instance(u2).pins.clone();
        network.connect(inp, n_in);
        network.connect(u1_pins[0], n_in);
        network.connect(u1_pins[1], n_mid);
        network.connect(u2_pins[0], n_mid);
        network.connect(u2_pins[1], n_out);
        network.connect(out, n_out);

        let sink = DiagnosticSink::new();
        let graph = build_graph(&network, &library, &sink, 2, 2);
        // 6 leaf pins, no bidirects.
        assert_eq!(graph.vertex_count(), 6);
        // 2 gate edges + 3 wire edges.
        assert_eq!(graph.edge_count(), 5);
        assert!(sink.diagnostics().is_empty());

        // in drives u1/A.
        let in_vertex = graph.pin_drvr_vertex(inp).unwrap();
        let out_edges: Vec<_> = graph.out_edges(in_vertex).collect();
        assert_eq!(out_edges.len(), 1);
        assert!(out_edges[0].is_wire());
    }

    #[test]
    fn isolated_net_skipped() {
        let interner = Interner::new();
        let library = test_library(&interner);
        let mut network = Network::new();
        let u1 = inv_instance(&mut network, &interner, "u1");
        let floating = network.make_net(interner.get_or_intern("floating"));
        let u1_pins = network.instance(u1).pins.clone();
        network.connect(u1_pins[1], floating);
        // Net has a driver but no loads.
        let sink = DiagnosticSink::new();
        let graph = build_graph(&network, &library, &sink, 2, 1);
        assert_eq!(graph.edge_count(), 1); // only the gate edge
    }

    #[test]
    fn check_edges_mark_vertices() {
        let interner = Interner::new();
        let library = test_library(&interner);
        let mut network = Network::new();
        let ff = network.make_instance(
            interner.get_or_intern("ff1"),
            CellId::from_raw(1),
            vec![
                interner.get_or_intern("ff1/CK"),
                interner.get_or_intern("ff1/D"),
                interner.get_or_intern("ff1/Q"),
            ],
        );
        let sink = DiagnosticSink::new();
        let graph = build_graph(&network, &library, &sink, 2, 1);
        let pins = network.instance(ff).pins.clone();
        let ck = graph.pin_load_vertex(pins[0]).unwrap();
        let d = graph.pin_load_vertex(pins[1]).unwrap();
        assert!(graph.vertex(ck).is_reg_clk);
        assert!(graph.vertex(ck).is_check_clk);
        assert!(graph.vertex(d).has_checks);
        assert!(graph.reg_clk_vertices.contains(&ck));
    }

    #[test]
    fn conditional_arc_disabled_by_constant() {
        let interner = Interner::new();
        let mut library = test_library(&interner);
        // Gate the INV arc on port A being high.
        library.cells[0].arc_sets[0].condition = Some(FuncExpr::Port(PortId::from_raw(0)));
        let mut network = Network::new();
        let u1 = inv_instance(&mut network, &interner, "u1");
        let a_pin = network.instance(u1).pins[0];
        network.set_constant(a_pin, LogicValue::Zero);
        let sink = DiagnosticSink::new();
        let graph = build_graph(&network, &library, &sink, 2, 1);
        let gate_edge = graph
            .edge_ids()
            .map(|id| graph.edge(id))
            .find(|e| !e.is_wire())
            .unwrap();
        assert!(gate_edge.is_disabled_cond);
    }

    #[test]
    fn clock_gate_enable_marked() {
        let interner = Interner::new();
        // Integrated clock-gating cell: CK gates through to GCLK, and the
        // enable EN is checked against CK.
        let icg = LibertyCell {
            id: CellId::from_raw(0),
            name: interner.get_or_intern("ICG_X1"),
            ports: vec![
                port(0, interner.get_or_intern("CK"), PortDirection::Input, false),
                port(1, interner.get_or_intern("EN"), PortDirection::Input, false),
                port(2, interner.get_or_intern("GCLK"), PortDirection::Output, false),
            ],
            arc_sets: vec![
                TimingArcSet {
                    id: ArcSetId::from_raw(0),
                    from_port: PortId::from_raw(0),
                    to_port: PortId::from_raw(2),
                    role: TimingRole::Combinational,
                    sense: TimingSense::PositiveUnate,
                    condition: None,
                    arcs: comb_arcs(0.0),
                },
                TimingArcSet {
                    id: ArcSetId::from_raw(1),
                    from_port: PortId::from_raw(0),
                    to_port: PortId::from_raw(1),
                    role: TimingRole::Setup,
                    sense: TimingSense::NonUnate,
                    condition: None,
                    arcs: vec![TimingArc {
                        from_rf: RiseFall::Rise,
                        to_rf: RiseFall::Rise,
                        delay: DelayModel::Constant(0.1),
                        slew: None,
                    }],
                },
            ],
            sequentials: vec![],
            is_clock_gate: true,
        };
        let library = Library {
            name: interner.get_or_intern("lib"),
            units: Units::default(),
            cells: vec![icg],
        };
        let mut network = Network::new();
        let gate = network.make_instance(
            interner.get_or_intern("icg1"),
            CellId::from_raw(0),
            vec![
                interner.get_or_intern("icg1/CK"),
                interner.get_or_intern("icg1/EN"),
                interner.get_or_intern("icg1/GCLK"),
            ],
        );
        let sink = DiagnosticSink::new();
        let graph = build_graph(&network, &library, &sink, 2, 1);
        let pins = network.instance(gate).pins.clone();
        let en = graph.pin_load_vertex(pins[1]).unwrap();
        let ck = graph.pin_load_vertex(pins[0]).unwrap();
        assert!(graph.vertex(en).is_gated_clk_enable);
        assert!(graph.vertex(en).has_checks);
        assert!(graph.vertex(ck).is_check_clk);
        assert!(!graph.vertex(ck).is_gated_clk_enable);
    }

    #[test]
    fn downstream_clk_pins_marked_through_fanin() {
        let interner = Interner::new();
        let library = test_library(&interner);
        let mut network = Network::new();
        let clk = network.make_top_port(interner.get_or_intern("clk"), PortDirection::Input);
        let buf = inv_instance(&mut network, &interner, "clkbuf");
        let ff = network.make_instance(
            interner.get_or_intern("ff1"),
            CellId::from_raw(1),
            vec![
                interner.get_or_intern("ff1/CK"),
                interner.get_or_intern("ff1/D"),
                interner.get_or_intern("ff1/Q"),
            ],
        );
        let buf_pins = network.instance(buf).pins.clone();
        let ff_pins = network.instance(ff).pins.clone();
        let n1 = network.make_net(interner.get_or_intern("n1"));
        let n2 = network.make_net(interner.get_or_intern("n2"));
        network.connect(clk, n1);
        network.connect(buf_pins[0], n1);
        network.connect(buf_pins[1], n2);
        network.connect(ff_pins[0], n2);

        let sink = DiagnosticSink::new();
        let graph = build_graph(&network, &library, &sink, 2, 1);
        let clk_vertex = graph.pin_drvr_vertex(clk).unwrap();
        let buf_in = graph.pin_load_vertex(buf_pins[0]).unwrap();
        assert!(graph.vertex(clk_vertex).has_downstream_clk_pin);
        assert!(graph.vertex(buf_in).has_downstream_clk_pin);
    }
}
