//! Vertex and edge tables with side arrays and intrusive adjacency lists.

use crate::ids::{EdgeId, VertexId};
use chronos_common::{LogicValue, RiseFall};
use chronos_netlist::{
    ArcSetId, CellId, InstanceId, Library, NetId, Network, PinId, TimingRole, TimingSense,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Topological level bits; levels beyond this indicate an unbroken cycle.
pub const LEVEL_MAX: u32 = (1 << 24) - 1;

/// DFS colouring used by levelisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelColor {
    /// Not yet visited.
    White,
    /// On the DFS stack.
    Gray,
    /// Finished.
    Black,
}

/// Which BFS queue a vertex is enqueued in; one bit each in the vertex's
/// membership mask, used to deduplicate enqueues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BfsIndex {
    /// Delay calculation queue.
    DelayCalc,
    /// Forward arrival queue.
    Arrival,
    /// Backward required queue.
    Required,
    /// Miscellaneous traversals.
    Other,
}

impl BfsIndex {
    fn bit(self) -> u8 {
        match self {
            BfsIndex::DelayCalc => 1 << 0,
            BfsIndex::Arrival => 1 << 1,
            BfsIndex::Required => 1 << 2,
            BfsIndex::Other => 1 << 3,
        }
    }
}

/// One driver or load side of a network pin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    /// This vertex's id.
    pub id: VertexId,
    /// The owning pin (back reference, not owned).
    pub pin: PinId,
    /// Topological level; 0 for roots.
    pub level: u32,
    /// Distinguishes the driver vertex of a bidirect pin.
    pub is_bidirect_driver: bool,
    /// The pin is a register/latch clock pin.
    pub is_reg_clk: bool,
    /// Disabled by constraint.
    pub is_disabled_constraint: bool,
    /// Constrained by timing check edges.
    pub has_checks: bool,
    /// Is the clock for a timing check.
    pub is_check_clk: bool,
    /// Enable of a clock-gating cell.
    pub is_gated_clk_enable: bool,
    /// A clock pin is reachable downstream.
    pub has_downstream_clk_pin: bool,
    /// Has output-delay, data-check, or path-delay constraints.
    pub is_constrained: bool,
    /// Constant value from simulation/case analysis.
    pub sim_value: LogicValue,
    /// DFS colour for levelisation.
    pub color: LevelColor,
    /// BFS queue membership bits.
    bfs_in_queue: u8,
    /// Index of the tag group currently holding this vertex's paths, as
    /// assigned by the search.
    pub tag_group_index: Option<u32>,
    // Slews indexed [rf][ap]; length slew_rf_count * ap_count.
    slews: Vec<f64>,
    slew_annotated: Vec<bool>,
    // Intrusive adjacency list heads.
    pub(crate) in_edges_head: Option<EdgeId>,
    pub(crate) out_edges_head: Option<EdgeId>,
}

impl Vertex {
    /// True for root vertices.
    pub fn is_root(&self) -> bool {
        self.level == 0
    }

    /// True if the vertex is in the given BFS queue.
    pub fn bfs_in_queue(&self, index: BfsIndex) -> bool {
        self.bfs_in_queue & index.bit() != 0
    }

    /// Sets or clears BFS queue membership.
    pub fn set_bfs_in_queue(&mut self, index: BfsIndex, value: bool) {
        if value {
            self.bfs_in_queue |= index.bit();
        } else {
            self.bfs_in_queue &= !index.bit();
        }
    }

    /// True if any slew slot is annotated.
    pub fn slew_annotated(&self) -> bool {
        self.slew_annotated.iter().any(|&a| a)
    }
}

/// What an edge models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// A library timing arc set inside an instance.
    Gate {
        /// The instance.
        instance: InstanceId,
        /// The instance's cell.
        cell: CellId,
        /// The arc set within the cell.
        arc_set: ArcSetId,
    },
    /// A wire arc from a net driver to one load.
    Wire {
        /// The net.
        net: NetId,
    },
}

/// The "delay is annotated" bitmap: inline for small arc sets, heap vector
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum AnnotatedBits {
    Inline(u64),
    Heap(Vec<bool>),
}

impl AnnotatedBits {
    fn new(count: usize) -> Self {
        if count <= 64 {
            AnnotatedBits::Inline(0)
        } else {
            AnnotatedBits::Heap(vec![false; count])
        }
    }

    fn get(&self, index: usize) -> bool {
        match self {
            AnnotatedBits::Inline(bits) => bits & (1u64 << index) != 0,
            AnnotatedBits::Heap(bits) => bits[index],
        }
    }

    fn set(&mut self, index: usize, value: bool) {
        match self {
            AnnotatedBits::Inline(bits) => {
                if value {
                    *bits |= 1u64 << index;
                } else {
                    *bits &= !(1u64 << index);
                }
            }
            AnnotatedBits::Heap(bits) => bits[index] = value,
        }
    }

    fn any(&self) -> bool {
        match self {
            AnnotatedBits::Inline(bits) => *bits != 0,
            AnnotatedBits::Heap(bits) => bits.iter().any(|&b| b),
        }
    }

    fn clear(&mut self) {
        match self {
            AnnotatedBits::Inline(bits) => *bits = 0,
            AnnotatedBits::Heap(bits) => bits.iter_mut().for_each(|b| *b = false),
        }
    }
}

/// One timing relationship between two vertices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// This edge's id.
    pub id: EdgeId,
    /// Source vertex.
    pub from: VertexId,
    /// Destination vertex.
    pub to: VertexId,
    /// Gate or wire.
    pub kind: EdgeKind,
    /// The role of the underlying arcs.
    pub role: TimingRole,
    /// Library sense of the underlying arcs.
    pub sense: TimingSense,
    /// Sense after simplifying against constants on sibling pins.
    pub sim_sense: TimingSense,
    /// Number of arcs in the set; side arrays size to `arcs * ap_count`.
    pub arc_count: u32,
    /// Disabled by `set_disable_timing`.
    pub is_disabled_constraint: bool,
    /// Disabled because the `when` condition is constant false.
    pub is_disabled_cond: bool,
    /// Disabled by levelisation to break a combinational loop.
    pub is_disabled_loop: bool,
    /// Internal path of a bidirect pin's instance.
    pub is_bidirect_inst_path: bool,
    /// Driver-to-load wire path of one bidirect pin.
    pub is_bidirect_net_path: bool,
    /// SDF annotation adds to the computed delay instead of replacing it.
    pub delay_annotation_is_incremental: bool,
    // Arc delays indexed [arc][ap].
    arc_delays: Vec<f64>,
    annotated: AnnotatedBits,
    // Intrusive adjacency links.
    pub(crate) next_in: Option<EdgeId>,
    pub(crate) next_out: Option<EdgeId>,
}

impl Edge {
    /// True if the edge is a wire arc.
    pub fn is_wire(&self) -> bool {
        matches!(self.kind, EdgeKind::Wire { .. })
    }

    /// True if any search may traverse the edge.
    pub fn is_disabled(&self) -> bool {
        self.is_disabled_constraint || self.is_disabled_cond || self.is_disabled_loop
    }
}

/// The timing graph: owns all vertices and edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    // Load/single vertex per pin; bidirect driver vertices map separately.
    pin_vertex: HashMap<PinId, VertexId>,
    pin_bidirect_drvr_vertex: HashMap<PinId, VertexId>,
    /// Number of slew transitions stored per analysis point: 0, 1, or 2.
    pub slew_rf_count: usize,
    /// Number of delay-calc analysis points.
    pub ap_count: usize,
    /// Register/latch clock vertices, for search seeding.
    pub reg_clk_vertices: BTreeSet<VertexId>,
    /// Levels are current.
    pub levels_valid: bool,
    /// Highest assigned level.
    pub max_level: u32,
}

impl Graph {
    /// Creates an empty graph sized for the given slew transitions and
    /// analysis points.
    pub fn new(slew_rf_count: usize, ap_count: usize) -> Self {
        debug_assert!(slew_rf_count <= 2);
        Self {
            vertices: Vec::new(),
            edges: Vec::new(),
            pin_vertex: HashMap::new(),
            pin_bidirect_drvr_vertex: HashMap::new(),
            slew_rf_count,
            ap_count,
            reg_clk_vertices: BTreeSet::new(),
            levels_valid: false,
            max_level: 0,
        }
    }

    /// The vertex with the given id.
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.as_usize()]
    }

    /// Mutable access to a vertex.
    pub fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex {
        &mut self.vertices[id.as_usize()]
    }

    /// The edge with the given id.
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.as_usize()]
    }

    /// Mutable access to an edge.
    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id.as_usize()]
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All vertex ids in id order.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.vertices.len()).map(|i| VertexId::from_raw(i as u32))
    }

    /// All edge ids in id order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        (0..self.edges.len()).map(|i| EdgeId::from_raw(i as u32))
    }

    /// Both vertices of a pin: (load-or-only vertex, bidirect driver).
    pub fn pin_vertices(&self, pin: PinId) -> (Option<VertexId>, Option<VertexId>) {
        (
            self.pin_vertex.get(&pin).copied(),
            self.pin_bidirect_drvr_vertex.get(&pin).copied(),
        )
    }

    /// The load vertex of a pin.
    pub fn pin_load_vertex(&self, pin: PinId) -> Option<VertexId> {
        self.pin_vertex.get(&pin).copied()
    }

    /// The driver vertex of a pin: the bidirect driver when the pin is
    /// split, otherwise the pin's only vertex.
    pub fn pin_drvr_vertex(&self, pin: PinId) -> Option<VertexId> {
        self.pin_bidirect_drvr_vertex
            .get(&pin)
            .or_else(|| self.pin_vertex.get(&pin))
            .copied()
    }

    /// Creates a vertex for a pin.
    pub fn make_vertex(&mut self, pin: PinId, is_bidirect_driver: bool, is_reg_clk: bool) -> VertexId {
        let id = VertexId::from_raw(self.vertices.len() as u32);
        self.vertices.push(Vertex {
            id,
            pin,
            level: 0,
            is_bidirect_driver,
            is_reg_clk,
            is_disabled_constraint: false,
            has_checks: false,
            is_check_clk: false,
            is_gated_clk_enable: false,
            has_downstream_clk_pin: false,
            is_constrained: false,
            sim_value: LogicValue::Unknown,
            color: LevelColor::White,
            bfs_in_queue: 0,
            tag_group_index: None,
            slews: vec![0.0; self.slew_rf_count * self.ap_count],
            slew_annotated: vec![false; self.slew_rf_count * self.ap_count],
            in_edges_head: None,
            out_edges_head: None,
        });
        if is_bidirect_driver {
            self.pin_bidirect_drvr_vertex.insert(pin, id);
        } else {
            self.pin_vertex.insert(pin, id);
        }
        if is_reg_clk {
            self.reg_clk_vertices.insert(id);
        }
        id
    }

    /// Creates an edge and links it into both adjacency lists.
    #[allow(clippy::too_many_arguments)]
    pub fn make_edge(
        &mut self,
        from: VertexId,
        to: VertexId,
        kind: EdgeKind,
        role: TimingRole,
        sense: TimingSense,
        arc_count: u32,
    ) -> EdgeId {
        let id = EdgeId::from_raw(self.edges.len() as u32);
        let slots = arc_count as usize * self.ap_count;
        let mut edge = Edge {
            id,
            from,
            to,
            kind,
            role,
            sense,
            sim_sense: sense,
            arc_count,
            is_disabled_constraint: false,
            is_disabled_cond: false,
            is_disabled_loop: false,
            is_bidirect_inst_path: false,
            is_bidirect_net_path: false,
            delay_annotation_is_incremental: false,
            arc_delays: vec![0.0; slots],
            annotated: AnnotatedBits::new(slots),
            next_in: None,
            next_out: None,
        };
        edge.next_in = self.vertices[to.as_usize()].in_edges_head.replace(id);
        edge.next_out = self.vertices[from.as_usize()].out_edges_head.replace(id);
        self.edges.push(edge);
        self.levels_valid = false;
        id
    }

    /// Unlinks an edge from both adjacency lists. The edge slot stays in
    /// the table but is unreachable from traversal.
    pub fn delete_edge(&mut self, id: EdgeId) {
        let (from, to) = {
            let edge = self.edge(id);
            (edge.from, edge.to)
        };
        self.unlink_in(to, id);
        self.unlink_out(from, id);
        self.levels_valid = false;
    }

    fn unlink_in(&mut self, vertex: VertexId, id: EdgeId) {
        let mut cursor = self.vertices[vertex.as_usize()].in_edges_head;
        if cursor == Some(id) {
            self.vertices[vertex.as_usize()].in_edges_head = self.edges[id.as_usize()].next_in;
            return;
        }
        while let Some(current) = cursor {
            let next = self.edges[current.as_usize()].next_in;
            if next == Some(id) {
                self.edges[current.as_usize()].next_in = self.edges[id.as_usize()].next_in;
                return;
            }
            cursor = next;
        }
    }

    fn unlink_out(&mut self, vertex: VertexId, id: EdgeId) {
        let mut cursor = self.vertices[vertex.as_usize()].out_edges_head;
        if cursor == Some(id) {
            self.vertices[vertex.as_usize()].out_edges_head = self.edges[id.as_usize()].next_out;
            return;
        }
        while let Some(current) = cursor {
            let next = self.edges[current.as_usize()].next_out;
            if next == Some(id) {
                self.edges[current.as_usize()].next_out = self.edges[id.as_usize()].next_out;
                return;
            }
            cursor = next;
        }
    }

    /// Edges into a vertex.
    pub fn in_edges(&self, vertex: VertexId) -> InEdgeIter<'_> {
        InEdgeIter {
            graph: self,
            next: self.vertex(vertex).in_edges_head,
        }
    }

    /// Edges out of a vertex.
    pub fn out_edges(&self, vertex: VertexId) -> OutEdgeIter<'_> {
        OutEdgeIter {
            graph: self,
            next: self.vertex(vertex).out_edges_head,
        }
    }

    /// True if the vertex has exactly one fanin edge.
    pub fn has_fanin_one(&self, vertex: VertexId) -> bool {
        let mut iter = self.in_edges(vertex);
        iter.next().is_some() && iter.next().is_none()
    }

    /// The wire edges crossing a hierarchical pin: every wire edge built
    /// from one of the nets the pin connects.
    pub fn edges_thru_hier_pin(&self, hpin: PinId, network: &Network) -> Vec<EdgeId> {
        let nets = network.hier_pin_nets(hpin);
        self.edges
            .iter()
            .filter(|e| match &e.kind {
                EdgeKind::Wire { net } => nets.contains(net),
                EdgeKind::Gate { .. } => false,
            })
            .map(|e| e.id)
            .collect()
    }

    // Side array access.

    fn slew_slot(&self, rf: RiseFall, ap_index: usize) -> usize {
        debug_assert!(ap_index < self.ap_count);
        // With one slew per rise/fall, both transitions share slot 0.
        let rf_index = if self.slew_rf_count < 2 { 0 } else { rf.index() };
        rf_index * self.ap_count + ap_index
    }

    /// The slew at a vertex.
    pub fn slew(&self, vertex: VertexId, rf: RiseFall, ap_index: usize) -> f64 {
        if self.slew_rf_count == 0 {
            return 0.0;
        }
        let slot = self.slew_slot(rf, ap_index);
        self.vertex(vertex).slews[slot]
    }

    /// Sets the slew at a vertex.
    pub fn set_slew(&mut self, vertex: VertexId, rf: RiseFall, ap_index: usize, slew: f64) {
        if self.slew_rf_count == 0 {
            return;
        }
        let slot = self.slew_slot(rf, ap_index);
        self.vertices[vertex.as_usize()].slews[slot] = slew;
    }

    /// True if the vertex slew is annotated for (rf, ap).
    pub fn slew_annotated(&self, vertex: VertexId, rf: RiseFall, ap_index: usize) -> bool {
        if self.slew_rf_count == 0 {
            return false;
        }
        let slot = self.slew_slot(rf, ap_index);
        self.vertex(vertex).slew_annotated[slot]
    }

    /// Marks the vertex slew annotated for (rf, ap).
    pub fn set_slew_annotated(
        &mut self,
        vertex: VertexId,
        rf: RiseFall,
        ap_index: usize,
        annotated: bool,
    ) {
        if self.slew_rf_count == 0 {
            return;
        }
        let slot = self.slew_slot(rf, ap_index);
        self.vertices[vertex.as_usize()].slew_annotated[slot] = annotated;
    }

    fn delay_slot(&self, arc_index: usize, ap_index: usize) -> usize {
        debug_assert!(ap_index < self.ap_count);
        arc_index * self.ap_count + ap_index
    }

    /// The delay of one arc of an edge at an analysis point.
    pub fn arc_delay(&self, edge: EdgeId, arc_index: usize, ap_index: usize) -> f64 {
        let slot = self.delay_slot(arc_index, ap_index);
        self.edge(edge).arc_delays[slot]
    }

    /// Sets the delay of one arc of an edge.
    pub fn set_arc_delay(&mut self, edge: EdgeId, arc_index: usize, ap_index: usize, delay: f64) {
        let slot = self.delay_slot(arc_index, ap_index);
        self.edges[edge.as_usize()].arc_delays[slot] = delay;
    }

    /// Wire arc delay: wire edges carry one arc per transition.
    pub fn wire_arc_delay(&self, edge: EdgeId, rf: RiseFall, ap_index: usize) -> f64 {
        self.arc_delay(edge, rf.index(), ap_index)
    }

    /// Sets a wire arc delay.
    pub fn set_wire_arc_delay(&mut self, edge: EdgeId, rf: RiseFall, ap_index: usize, delay: f64) {
        self.set_arc_delay(edge, rf.index(), ap_index, delay);
    }

    /// True if the (arc, ap) slot carries an external annotation.
    pub fn arc_delay_annotated(&self, edge: EdgeId, arc_index: usize, ap_index: usize) -> bool {
        let slot = self.delay_slot(arc_index, ap_index);
        self.edge(edge).annotated.get(slot)
    }

    /// Marks the (arc, ap) slot annotated.
    pub fn set_arc_delay_annotated(
        &mut self,
        edge: EdgeId,
        arc_index: usize,
        ap_index: usize,
        annotated: bool,
    ) {
        let slot = self.delay_slot(arc_index, ap_index);
        self.edges[edge.as_usize()].annotated.set(slot, annotated);
    }

    /// True if any arc of the edge is annotated.
    pub fn delay_annotated(&self, edge: EdgeId) -> bool {
        self.edge(edge).annotated.any()
    }

    /// Removes all delay and slew annotations, returning side arrays to
    /// calculator control.
    pub fn remove_delay_slew_annotations(&mut self) {
        for edge in &mut self.edges {
            edge.annotated.clear();
            edge.delay_annotation_is_incremental = false;
        }
        for vertex in &mut self.vertices {
            vertex.slew_annotated.iter_mut().for_each(|a| *a = false);
        }
    }

    /// Applies constraint disables from the SDC to edges and vertices.
    /// Disabling is additive across scopes: pins, edges, instances, cell
    /// arcs, and hierarchical pins.
    pub fn apply_disables(&mut self, sdc: &chronos_sdc::Sdc, network: &Network, library: &Library) {
        // Wire edges crossing a disabled hierarchical pin are disabled by
        // their net.
        let disabled_nets: std::collections::HashSet<NetId> = sdc
            .disables
            .hier_pins
            .iter()
            .flat_map(|&hpin| network.hier_pin_nets(hpin).iter().copied())
            .collect();
        for edge_idx in 0..self.edges.len() {
            let edge_id = EdgeId::from_raw(edge_idx as u32);
            let (from_pin, to_pin, kind) = {
                let edge = self.edge(edge_id);
                (
                    self.vertex(edge.from).pin,
                    self.vertex(edge.to).pin,
                    edge.kind.clone(),
                )
            };
            let disabled = match kind {
                EdgeKind::Gate {
                    instance,
                    cell,
                    arc_set,
                } => {
                    let set = library.cell(cell).arc_set(arc_set);
                    sdc.disables.gate_edge_disabled(
                        from_pin,
                        to_pin,
                        instance,
                        cell,
                        set.from_port,
                        set.to_port,
                    )
                }
                EdgeKind::Wire { net } => {
                    sdc.disables.wire_edge_disabled(from_pin, to_pin)
                        || disabled_nets.contains(&net)
                }
            };
            if disabled {
                self.edges[edge_idx].is_disabled_constraint = true;
            }
        }
    }
}

/// Iterator over a vertex's in-edges.
pub struct InEdgeIter<'a> {
    graph: &'a Graph,
    next: Option<EdgeId>,
}

impl<'a> Iterator for InEdgeIter<'a> {
    type Item = &'a Edge;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let edge = self.graph.edge(id);
        self.next = edge.next_in;
        Some(edge)
    }
}

/// Iterator over a vertex's out-edges.
pub struct OutEdgeIter<'a> {
    graph: &'a Graph,
    next: Option<EdgeId>,
}

impl<'a> Iterator for OutEdgeIter<'a> {
    type Item = &'a Edge;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let edge = self.graph.edge(id);
        self.next = edge.next_out;
        Some(edge)
    }
}
