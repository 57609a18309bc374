//! The engine façade: collaborators, core state, and update sequencing.

use chronos_common::{ChronosResult, Interner, MinMax, RiseFall, Slack};
use chronos_dcalc::{AnalysisPt, ArcDelayCalc, DelayContext, GraphDelayCalc, LumpedCapDelayCalc};
use chronos_diagnostics::DiagnosticSink;
use chronos_graph::{build_graph, levelize, EdgeId, Graph, VertexId};
use chronos_netlist::{Library, Network, Parasitics, PinId};
use chronos_sdc::Sdc;
use chronos_search::{PathEnd, PathGroups, ReportSpec, Search, SearchContext};

/// The static timing analysis engine.
///
/// Owns the collaborator data and the core subsystems. All queries go
/// through [`update_timing`](Self::update_timing), which re-runs only what
/// the dirty sets reach; `full` forces a rebuild from the network.
pub struct Sta {
    /// The name interner shared across collaborators.
    pub interner: Interner,
    /// The linked network.
    pub network: Network,
    /// The liberty library.
    pub library: Library,
    /// Per-net parasitics.
    pub parasitics: Parasitics,
    /// The constraint set.
    pub sdc: Sdc,
    /// Diagnostic sink.
    pub sink: DiagnosticSink,
    graph: Option<Graph>,
    dcalc: GraphDelayCalc,
    delay_calc: Box<dyn ArcDelayCalc>,
    search: Search,
    aps: Vec<AnalysisPt>,
}

impl Sta {
    /// Creates an engine over a linked network and library.
    pub fn new(interner: Interner, network: Network, library: Library) -> Self {
        Self {
            interner,
            network,
            library,
            parasitics: Parasitics::new(),
            sdc: Sdc::new(),
            sink: DiagnosticSink::new(),
            graph: None,
            dcalc: GraphDelayCalc::new(),
            delay_calc: Box::new(LumpedCapDelayCalc::new()),
            search: Search::new(),
            aps: vec![
                AnalysisPt {
                    index: 0,
                    min_max: MinMax::Min,
                },
                AnalysisPt {
                    index: 1,
                    min_max: MinMax::Max,
                },
            ],
        }
    }

    /// The analysis points, in index order.
    pub fn analysis_points(&self) -> &[AnalysisPt] {
        &self.aps
    }

    /// Replaces the delay calculator.
    pub fn set_delay_calc(&mut self, calc: Box<dyn ArcDelayCalc>) {
        self.delay_calc = calc;
        self.dcalc.delays_invalid();
        self.search.arrivals_invalid();
    }

    /// The timing graph; `None` before the first update.
    pub fn graph(&self) -> Option<&Graph> {
        self.graph.as_ref()
    }

    /// The search engine, for report expansion.
    pub fn search(&self) -> &Search {
        &self.search
    }

    /// Rebuilds everything from the collaborators on the next update.
    pub fn network_changed(&mut self) {
        self.graph = None;
        self.dcalc.delays_invalid();
        self.search.arrivals_invalid();
        self.search.clear();
    }

    /// Re-seeds arrivals on the next update; constraints changed but the
    /// netlist did not.
    pub fn constraints_changed(&mut self) {
        self.dcalc.delays_invalid();
        self.search.arrivals_invalid();
    }

    /// Recomputes timing. `full` discards all state first; otherwise the
    /// dirty sets bound the work.
    pub fn update_timing(&mut self, full: bool) -> ChronosResult<()> {
        if full {
            self.network_changed();
        }
        // Case analysis values land on the network before graph
        // construction so conditional arcs simplify against them.
        for (pin, value) in self.sdc.case_values.clone() {
            self.network.set_constant(pin, value);
        }
        self.ensure_graph()?;
        let mut graph = self.graph.take().expect("graph built above");

        let delay_ctx = DelayContext {
            network: &self.network,
            library: &self.library,
            parasitics: &self.parasitics,
            aps: &self.aps,
            sink: &self.sink,
        };
        let changed =
            self.dcalc
                .find_delays(&mut graph, self.delay_calc.as_ref(), &delay_ctx, None)?;
        for vertex in changed {
            self.search.arrival_invalid(vertex);
        }

        let ctx = SearchContext {
            network: &self.network,
            library: &self.library,
            sdc: &self.sdc,
            interner: &self.interner,
            sink: &self.sink,
            aps: &self.aps,
        };
        let result = self.search.update(&mut graph, &ctx);
        self.graph = Some(graph);
        result
    }

    fn ensure_graph(&mut self) -> ChronosResult<()> {
        if self.graph.is_none() {
            let mut graph = build_graph(&self.network, &self.library, &self.sink, 2, self.aps.len());
            graph.apply_disables(&self.sdc, &self.network, &self.library);
            self.graph = Some(graph);
        }
        let graph = self.graph.as_mut().expect("graph present");
        if !graph.levels_valid {
            levelize(graph, &self.network, &self.interner, &self.sink)?;
        }
        Ok(())
    }

    /// Computes timing and returns the ranked, grouped path ends.
    pub fn find_path_ends(&mut self, spec: &ReportSpec) -> ChronosResult<PathGroups> {
        self.update_timing(false)?;
        let graph = self.graph.as_ref().expect("graph after update");
        let ctx = self.search_ctx();
        let ends = self.search.find_path_ends(graph, &ctx);
        Ok(PathGroups::make(ends, spec, &self.search, graph, &ctx))
    }

    /// All raw path ends at the current endpoints.
    pub fn path_ends(&mut self) -> ChronosResult<Vec<PathEnd>> {
        self.update_timing(false)?;
        let graph = self.graph.as_ref().expect("graph after update");
        let ctx = self.search_ctx();
        Ok(self.search.find_path_ends(graph, &ctx))
    }

    /// Worst endpoint slack for one pole, with its vertex.
    pub fn worst_slack(&mut self, min_max: MinMax) -> ChronosResult<Option<(Slack, VertexId)>> {
        self.update_timing(false)?;
        let graph = self.graph.as_ref().expect("graph after update");
        let ctx = self.search_ctx();
        Ok(self.search.worst_slack(min_max, graph, &ctx))
    }

    /// Sum of negative endpoint slacks for one pole.
    pub fn total_negative_slack(&mut self, min_max: MinMax) -> ChronosResult<Slack> {
        self.update_timing(false)?;
        let graph = self.graph.as_ref().expect("graph after update");
        let ctx = self.search_ctx();
        Ok(self.search.total_negative_slack(min_max, graph, &ctx))
    }

    fn search_ctx(&self) -> SearchContext<'_> {
        SearchContext {
            network: &self.network,
            library: &self.library,
            sdc: &self.sdc,
            interner: &self.interner,
            sink: &self.sink,
            aps: &self.aps,
        }
    }

    // Annotation entry points (SDF-shaped).

    /// Annotates one arc delay. `incremental` adds to the present value
    /// instead of replacing it. Downstream timing is invalidated.
    pub fn set_annotated_delay(
        &mut self,
        edge: EdgeId,
        arc_idx: usize,
        ap_idx: usize,
        delay: f64,
        incremental: bool,
    ) {
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        let value = if incremental {
            graph.arc_delay(edge, arc_idx, ap_idx) + delay
        } else {
            delay
        };
        graph.set_arc_delay(edge, arc_idx, ap_idx, value);
        graph.set_arc_delay_annotated(edge, arc_idx, ap_idx, true);
        graph.edge_mut(edge).delay_annotation_is_incremental = incremental;
        let to = graph.edge(edge).to;
        let from = graph.edge(edge).from;
        self.dcalc.delay_invalid(from);
        self.dcalc.delay_invalid(to);
        self.search.arrival_invalid(to);
    }

    /// Annotates a vertex slew for (rf, analysis point) and invalidates
    /// the delays that consumed it.
    pub fn set_annotated_slew(&mut self, vertex: VertexId, rf: RiseFall, ap_idx: usize, slew: f64) {
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        graph.set_slew(vertex, rf, ap_idx, slew);
        graph.set_slew_annotated(vertex, rf, ap_idx, true);
        self.dcalc.delay_invalid(vertex);
        self.search.arrival_invalid(vertex);
    }

    /// Removes all delay and slew annotations; calculator values return
    /// on the next update.
    pub fn remove_delay_slew_annotations(&mut self) {
        if let Some(graph) = self.graph.as_mut() {
            graph.remove_delay_slew_annotations();
        }
        self.dcalc.delays_invalid();
        self.search.arrivals_invalid();
    }

    // Netlist edit notifications.

    /// Connects a pin to a net and rebuilds the affected graph state.
    pub fn connect_pin(&mut self, pin: PinId, net: chronos_netlist::NetId) {
        self.network.connect(pin, net);
        self.network_changed();
    }

    /// Disconnects a pin from its net and rebuilds the affected graph
    /// state.
    pub fn disconnect_pin(&mut self, pin: PinId) {
        self.network.disconnect(pin);
        self.network_changed();
    }

    /// Resets all computed state, releasing side arrays and intern tables
    /// in batch.
    pub fn clear(&mut self) {
        self.graph = None;
        self.dcalc.delays_invalid();
        self.search.clear();
        self.search.arrivals_invalid();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronos_netlist::{
        ArcSetId, CellId, DelayModel, LibertyCell, LibertyPort, PortDirection, PortId, TimingArc,
        TimingArcSet, TimingRole, TimingSense, Units,
    };

    fn empty_library(interner: &Interner) -> Library {
        Library {
            name: interner.get_or_intern("lib"),
            units: Units::default(),
            cells: vec![],
        }
    }

    #[test]
    fn empty_design_updates_cleanly() {
        let interner = Interner::new();
        let library = empty_library(&interner);
        let network = Network::new();
        let mut sta = Sta::new(interner, network, library);
        sta.update_timing(true).unwrap();
        assert!(!sta.sink.has_errors());
        assert!(sta.search().endpoints().is_empty());
        let groups = sta.find_path_ends(&ReportSpec::default()).unwrap();
        assert!(groups.groups.is_empty());
        assert_eq!(sta.worst_slack(MinMax::Max).unwrap(), None);
    }

    #[test]
    fn annotation_invalidates_without_graph_noop() {
        let interner = Interner::new();
        let library = empty_library(&interner);
        let mut sta = Sta::new(interner, Network::new(), library);
        // No graph yet: annotation entry points are harmless no-ops.
        sta.set_annotated_delay(EdgeId::from_raw(0), 0, 0, 1.0, false);
        sta.set_annotated_slew(VertexId::from_raw(0), RiseFall::Rise, 0, 0.1);
        sta.remove_delay_slew_annotations();
        sta.update_timing(true).unwrap();
    }

    #[test]
    fn buffer_cell_smoke() {
        let interner = Interner::new();
        let buf = LibertyCell {
            id: CellId::from_raw(0),
            name: interner.get_or_intern("BUF_X1"),
            ports: vec![
                LibertyPort {
                    id: PortId::from_raw(0),
                    name: interner.get_or_intern("A"),
                    direction: PortDirection::Input,
                    capacitance: 0.01,
                    is_register_clk: false,
                    function: None,
                    tristate_enable: None,
                },
                LibertyPort {
                    id: PortId::from_raw(1),
                    name: interner.get_or_intern("Z"),
                    direction: PortDirection::Output,
                    capacitance: 0.0,
                    is_register_clk: false,
                    function: None,
                    tristate_enable: None,
                },
            ],
            arc_sets: vec![TimingArcSet {
                id: ArcSetId::from_raw(0),
                from_port: PortId::from_raw(0),
                to_port: PortId::from_raw(1),
                role: TimingRole::Combinational,
                sense: TimingSense::PositiveUnate,
                condition: None,
                arcs: RiseFall::ALL
                    .into_iter()
                    .map(|rf| TimingArc {
                        from_rf: rf,
                        to_rf: rf,
                        delay: DelayModel::Constant(1.0),
                        slew: Some(DelayModel::Constant(0.05)),
                    })
                    .collect(),
            }],
            sequentials: vec![],
            is_clock_gate: false,
        };
        let library = Library {
            name: interner.get_or_intern("lib"),
            units: Units::default(),
            cells: vec![buf],
        };
        let mut network = Network::new();
        let inp = network.make_top_port(interner.get_or_intern("in"), PortDirection::Input);
        let out = network.make_top_port(interner.get_or_intern("out"), PortDirection::Output);
        let u1 = network.make_instance(
            interner.get_or_intern("u1"),
            CellId::from_raw(0),
            vec![
                interner.get_or_intern("u1/A"),
                interner.get_or_intern("u1/Z"),
            ],
        );
        let pins = network.instance(u1).pins.clone();
        let n1 = network.make_net(interner.get_or_intern("n1"));
        let n2 = network.make_net(interner.get_or_intern("n2"));
        network.connect(inp, n1);
        network.connect(pins[0], n1);
        network.connect(pins[1], n2);
        network.connect(out, n2);

        let mut sta = Sta::new(interner, network, library);
        // The input has no clock or input delay; give it the synthetic
        // default arrival clock so it originates a path.
        sta.sdc.use_default_arrival_clock = true;
        sta.update_timing(true).unwrap();
        let graph = sta.graph().unwrap();
        // in -> u1/A -> u1/Z -> out: arrival 1.0 at the output vertex.
        let out_vertex = graph.pin_load_vertex(out).unwrap();
        let paths = sta.search().paths.paths(out_vertex);
        assert!(!paths.is_empty());
        let max_arrival = paths
            .iter()
            .map(|p| p.arrival)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!((max_arrival - 1.0).abs() < 1e-9);
    }
}
