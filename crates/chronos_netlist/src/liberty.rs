//! Liberty library data model: cells, ports, timing arc sets, delay models.
//!
//! This is the shape the liberty reader must deliver. The core's only
//! obligation to the lookup tables is the contract "given (input slew,
//! output load) return (delay, output slew)"; [`TableModel::lookup`]
//! implements that contract with bilinear interpolation clamped to the
//! table corners.

use crate::ids::{ArcSetId, CellId, PortId};
use chronos_common::{Ident, LogicValue, RiseFall};
use serde::{Deserialize, Serialize};

/// Library units, as scale factors to engine units (ns, pF, kΩ, V).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Units {
    /// Time unit in nanoseconds.
    pub time_ns: f64,
    /// Capacitance unit in picofarads.
    pub capacitance_pf: f64,
    /// Resistance unit in kiloohms.
    pub resistance_kohm: f64,
    /// Voltage unit in volts.
    pub voltage_v: f64,
}

impl Default for Units {
    fn default() -> Self {
        Self {
            time_ns: 1.0,
            capacitance_pf: 1.0,
            resistance_kohm: 1.0,
            voltage_v: 1.0,
        }
    }
}

/// The role of a timing arc set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimingRole {
    /// Combinational delay from an input to an output.
    Combinational,
    /// Clock-to-output delay at a register.
    RegClkToQ,
    /// Enable-to-output delay at a transparent latch.
    LatchEnToQ,
    /// Latch data-to-output delay while transparent.
    LatchDtoQ,
    /// Tristate enable (output turns on).
    TristateEnable,
    /// Tristate disable (output turns off).
    TristateDisable,
    /// Wire arc from a driver to a load on the same net.
    Wire,
    /// Setup check: data must settle before the clock edge.
    Setup,
    /// Hold check: data must be stable after the clock edge.
    Hold,
    /// Recovery check on an asynchronous control.
    Recovery,
    /// Removal check on an asynchronous control.
    Removal,
    /// Minimum pulse width check.
    Width,
    /// Minimum period check.
    Period,
}

impl TimingRole {
    /// True for check roles, which become constraint edges rather than
    /// delay edges.
    pub fn is_check(self) -> bool {
        matches!(
            self,
            TimingRole::Setup
                | TimingRole::Hold
                | TimingRole::Recovery
                | TimingRole::Removal
                | TimingRole::Width
                | TimingRole::Period
        )
    }

    /// True for roles checked against the late (max) data path.
    pub fn is_late_check(self) -> bool {
        matches!(self, TimingRole::Setup | TimingRole::Recovery)
    }

    /// True for roles whose delay propagates along a path.
    pub fn is_delay(self) -> bool {
        !self.is_check()
    }
}

/// The unateness of an arc set: how the output transition relates to the
/// input transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimingSense {
    /// Output follows input (buffer).
    PositiveUnate,
    /// Output inverts input (inverter).
    NegativeUnate,
    /// Either transition can cause either (xor).
    NonUnate,
    /// Sense not determined by the library.
    Unknown,
}

/// A boolean expression over cell ports, used for `when` conditions,
/// output functions, and tristate enables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuncExpr {
    /// A port reference.
    Port(PortId),
    /// Negation.
    Not(Box<FuncExpr>),
    /// Conjunction.
    And(Box<FuncExpr>, Box<FuncExpr>),
    /// Disjunction.
    Or(Box<FuncExpr>, Box<FuncExpr>),
}

impl FuncExpr {
    /// Evaluates the expression against per-port constant values.
    pub fn eval(&self, value_of: &dyn Fn(PortId) -> LogicValue) -> LogicValue {
        match self {
            FuncExpr::Port(port) => value_of(*port),
            FuncExpr::Not(e) => !e.eval(value_of),
            FuncExpr::And(a, b) => a.eval(value_of) & b.eval(value_of),
            FuncExpr::Or(a, b) => a.eval(value_of) | b.eval(value_of),
        }
    }

    /// Convenience constructor for `!e`.
    pub fn not(e: FuncExpr) -> FuncExpr {
        FuncExpr::Not(Box::new(e))
    }

    /// Convenience constructor for `a & b`.
    pub fn and(a: FuncExpr, b: FuncExpr) -> FuncExpr {
        FuncExpr::And(Box::new(a), Box::new(b))
    }

    /// Convenience constructor for `a | b`.
    pub fn or(a: FuncExpr, b: FuncExpr) -> FuncExpr {
        FuncExpr::Or(Box::new(a), Box::new(b))
    }
}

/// A two-axis lookup table keyed by input slew and load capacitance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableModel {
    /// Input slew axis, ascending.
    pub slew_axis: Vec<f64>,
    /// Load capacitance axis, ascending.
    pub cap_axis: Vec<f64>,
    /// Row-major values: `values[slew_idx * cap_axis.len() + cap_idx]`.
    pub values: Vec<f64>,
}

impl TableModel {
    /// Bilinear interpolation, clamped to the table corners.
    ///
    /// Out-of-range inputs (including degenerate zero-cap loads) clamp to
    /// the nearest axis cell rather than extrapolating.
    pub fn lookup(&self, slew: f64, cap: f64) -> f64 {
        let (si, sf) = Self::bracket(&self.slew_axis, slew);
        let (ci, cf) = Self::bracket(&self.cap_axis, cap);
        let ncap = self.cap_axis.len();
        let at = |s: usize, c: usize| self.values[s * ncap + c];
        let s1 = si.min(self.slew_axis.len() - 1);
        let s2 = (si + 1).min(self.slew_axis.len() - 1);
        let c1 = ci.min(ncap - 1);
        let c2 = (ci + 1).min(ncap - 1);
        let low = at(s1, c1) * (1.0 - cf) + at(s1, c2) * cf;
        let high = at(s2, c1) * (1.0 - cf) + at(s2, c2) * cf;
        low * (1.0 - sf) + high * sf
    }

    // Returns (lower index, fraction in [0,1]) with clamping at both ends.
    fn bracket(axis: &[f64], x: f64) -> (usize, f64) {
        if axis.len() < 2 || x <= axis[0] {
            return (0, 0.0);
        }
        let last = axis.len() - 1;
        if x >= axis[last] {
            return (last, 0.0);
        }
        let i = axis.partition_point(|&a| a <= x) - 1;
        let span = axis[i + 1] - axis[i];
        let f = if span > 0.0 { (x - axis[i]) / span } else { 0.0 };
        (i, f)
    }
}

/// How an arc's delay and output slew are computed from (input slew, load).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DelayModel {
    /// Fixed value independent of slew and load.
    Constant(f64),
    /// `intrinsic + drive_resistance * load_cap`.
    Linear {
        /// Zero-load delay.
        intrinsic: f64,
        /// Output drive resistance multiplied by load capacitance.
        drive_resistance: f64,
    },
    /// Two-axis lookup table.
    Table(TableModel),
}

impl DelayModel {
    /// Evaluates the model for the given input slew and load capacitance.
    pub fn value(&self, slew: f64, cap: f64) -> f64 {
        match self {
            DelayModel::Constant(v) => *v,
            DelayModel::Linear {
                intrinsic,
                drive_resistance,
            } => intrinsic + drive_resistance * cap,
            DelayModel::Table(table) => table.lookup(slew, cap),
        }
    }
}

/// One timing arc within an arc set: a (from transition, to transition)
/// pair with its delay and slew models.
///
/// For check arcs, `delay` is the margin model keyed by (clock slew,
/// data slew is folded into the margin by the calculator) and `slew` is
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingArc {
    /// Transition at the from pin. Wire and unate arcs pin this down;
    /// check arcs use the clock edge transition.
    pub from_rf: RiseFall,
    /// Transition at the to pin.
    pub to_rf: RiseFall,
    /// Delay (or check margin) model.
    pub delay: DelayModel,
    /// Output slew model; absent for checks.
    pub slew: Option<DelayModel>,
}

/// A set of timing arcs between two ports of a cell, sharing a role,
/// sense, and optional `when` condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingArcSet {
    /// This set's id within its owning cell.
    pub id: ArcSetId,
    /// The input/related port.
    pub from_port: PortId,
    /// The output/constrained port.
    pub to_port: PortId,
    /// The role of the arcs.
    pub role: TimingRole,
    /// The unateness of the arcs.
    pub sense: TimingSense,
    /// Optional `when` condition; the arc set is active only when the
    /// condition is not constant false under case analysis.
    pub condition: Option<FuncExpr>,
    /// The arcs, indexed densely; side arrays size to this length.
    pub arcs: Vec<TimingArc>,
}

impl TimingArcSet {
    /// The arcs whose from transition matches `from_rf`.
    pub fn arcs_from(&self, from_rf: RiseFall) -> impl Iterator<Item = (usize, &TimingArc)> {
        self.arcs
            .iter()
            .enumerate()
            .filter(move |(_, arc)| arc.from_rf == from_rf)
    }
}

/// The direction of a liberty port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port.
    Input,
    /// Output port.
    Output,
    /// Bidirectional port; yields a load and a driver vertex.
    Bidirect,
    /// Internal port, not visible for timing.
    Internal,
}

impl PortDirection {
    /// True if the port can drive a net.
    pub fn is_driver(self) -> bool {
        matches!(self, PortDirection::Output | PortDirection::Bidirect)
    }

    /// True if the port can load a net.
    pub fn is_load(self) -> bool {
        matches!(self, PortDirection::Input | PortDirection::Bidirect)
    }
}

/// A port of a liberty cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibertyPort {
    /// This port's id within its owning cell.
    pub id: PortId,
    /// Port name.
    pub name: Ident,
    /// Direction.
    pub direction: PortDirection,
    /// Pin capacitance presented to the driving net.
    pub capacitance: f64,
    /// True for register/latch clock pins (liberty `clock : true`).
    /// The graph marks fanout vertices of these pins as register clocks.
    pub is_register_clk: bool,
    /// Output function, when the library provides one; used to derive
    /// simulated timing senses under constants.
    pub function: Option<FuncExpr>,
    /// Tristate enable expression for three-state outputs.
    pub tristate_enable: Option<FuncExpr>,
}

/// The kind of sequential element a cell implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequentialKind {
    /// Edge-triggered register.
    Register,
    /// Level-sensitive transparent latch.
    Latch,
}

/// Sequential structure of a cell: which ports form the clock/data/output
/// triple. Latch cells drive the time-borrowing analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequential {
    /// Register or latch.
    pub kind: SequentialKind,
    /// Clock or enable port.
    pub clock_port: PortId,
    /// Data port.
    pub data_port: PortId,
    /// Output port.
    pub output_port: PortId,
}

/// A liberty cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibertyCell {
    /// This cell's id in the library.
    pub id: CellId,
    /// Cell name.
    pub name: Ident,
    /// Ports, indexed by `PortId`.
    pub ports: Vec<LibertyPort>,
    /// Timing arc sets, indexed by `ArcSetId`.
    pub arc_sets: Vec<TimingArcSet>,
    /// Sequential elements, empty for combinational cells.
    pub sequentials: Vec<Sequential>,
    /// Integrated clock-gating cell (`clock_gating_integrated_cell`).
    /// Its check arcs constrain the gating enable against the clock; the
    /// graph marks the enable pin's vertex as a gated-clock enable.
    pub is_clock_gate: bool,
}

impl LibertyCell {
    /// The port with the given id.
    pub fn port(&self, id: PortId) -> &LibertyPort {
        &self.ports[id.as_usize()]
    }

    /// Finds a port by name.
    pub fn find_port(&self, name: Ident) -> Option<&LibertyPort> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// The arc set with the given id.
    pub fn arc_set(&self, id: ArcSetId) -> &TimingArcSet {
        &self.arc_sets[id.as_usize()]
    }

    /// True if any sequential is a latch.
    pub fn has_latch(&self) -> bool {
        self.sequentials
            .iter()
            .any(|s| s.kind == SequentialKind::Latch)
    }
}

/// A linked liberty library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    /// Library name.
    pub name: Ident,
    /// Unit scale factors.
    pub units: Units,
    /// Cells, indexed by `CellId`.
    pub cells: Vec<LibertyCell>,
}

impl Library {
    /// The cell with the given id.
    pub fn cell(&self, id: CellId) -> &LibertyCell {
        &self.cells[id.as_usize()]
    }

    /// Finds a cell by name.
    pub fn find_cell(&self, name: Ident) -> Option<&LibertyCell> {
        self.cells.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronos_common::Interner;

    #[test]
    fn table_lookup_interior() {
        let table = TableModel {
            slew_axis: vec![0.0, 1.0],
            cap_axis: vec![0.0, 2.0],
            values: vec![0.0, 2.0, 1.0, 3.0],
        };
        // Midpoint of both axes.
        assert!((table.lookup(0.5, 1.0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn table_lookup_clamps_corners() {
        let table = TableModel {
            slew_axis: vec![0.1, 0.2],
            cap_axis: vec![1.0, 2.0],
            values: vec![10.0, 20.0, 30.0, 40.0],
        };
        assert_eq!(table.lookup(-5.0, -5.0), 10.0);
        assert_eq!(table.lookup(99.0, 99.0), 40.0);
        // Zero cap clamps to the low cap column.
        assert_eq!(table.lookup(0.1, 0.0), 10.0);
    }

    #[test]
    fn table_lookup_exact_points() {
        let table = TableModel {
            slew_axis: vec![0.0, 1.0, 2.0],
            cap_axis: vec![0.0, 1.0],
            values: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        };
        assert_eq!(table.lookup(1.0, 0.0), 3.0);
        assert_eq!(table.lookup(2.0, 1.0), 6.0);
    }

    #[test]
    fn delay_model_linear() {
        let model = DelayModel::Linear {
            intrinsic: 0.1,
            drive_resistance: 2.0,
        };
        assert!((model.value(0.0, 0.05) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn delay_model_constant() {
        assert_eq!(DelayModel::Constant(0.25).value(9.0, 9.0), 0.25);
    }

    #[test]
    fn func_expr_eval() {
        use chronos_common::LogicValue::*;
        let a = PortId::from_raw(0);
        let b = PortId::from_raw(1);
        let expr = FuncExpr::and(FuncExpr::Port(a), FuncExpr::not(FuncExpr::Port(b)));
        let eval = |va: LogicValue, vb: LogicValue| {
            expr.eval(&move |p: PortId| if p == a { va } else { vb })
        };
        assert_eq!(eval(One, Zero), One);
        assert_eq!(eval(One, One), Zero);
        assert_eq!(eval(Zero, Unknown), Zero);
        assert_eq!(eval(One, Unknown), Unknown);
    }

    #[test]
    fn role_classification() {
        assert!(TimingRole::Setup.is_check());
        assert!(TimingRole::Setup.is_late_check());
        assert!(TimingRole::Hold.is_check());
        assert!(!TimingRole::Hold.is_late_check());
        assert!(TimingRole::Combinational.is_delay());
        assert!(TimingRole::RegClkToQ.is_delay());
        assert!(!TimingRole::Width.is_delay());
    }

    #[test]
    fn direction_driver_load() {
        assert!(PortDirection::Output.is_driver());
        assert!(PortDirection::Bidirect.is_driver());
        assert!(PortDirection::Bidirect.is_load());
        assert!(!PortDirection::Input.is_driver());
        assert!(PortDirection::Input.is_load());
    }

    #[test]
    fn arcs_from_filters() {
        use chronos_common::RiseFall;
        let set = TimingArcSet {
            id: ArcSetId::from_raw(0),
            from_port: PortId::from_raw(0),
            to_port: PortId::from_raw(1),
            role: TimingRole::Combinational,
            sense: TimingSense::NegativeUnate,
            condition: None,
            arcs: vec![
                TimingArc {
                    from_rf: RiseFall::Rise,
                    to_rf: RiseFall::Fall,
                    delay: DelayModel::Constant(0.3),
                    slew: None,
                },
                TimingArc {
                    from_rf: RiseFall::Fall,
                    to_rf: RiseFall::Rise,
                    delay: DelayModel::Constant(0.2),
                    slew: None,
                },
            ],
        };
        let from_rise: Vec<_> = set.arcs_from(RiseFall::Rise).collect();
        assert_eq!(from_rise.len(), 1);
        assert_eq!(from_rise[0].0, 0);
        assert_eq!(from_rise[0].1.to_rf, RiseFall::Fall);
    }

    #[test]
    fn cell_port_queries() {
        let interner = Interner::new();
        let cell = LibertyCell {
            id: CellId::from_raw(0),
            name: interner.get_or_intern("INV_X1"),
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
                    name: interner.get_or_intern("ZN"),
                    direction: PortDirection::Output,
                    capacitance: 0.0,
                    is_register_clk: false,
                    function: Some(FuncExpr::not(FuncExpr::Port(PortId::from_raw(0)))),
                    tristate_enable: None,
                },
            ],
            arc_sets: vec![],
            sequentials: vec![],
            is_clock_gate: false,
        };
        assert!(cell.find_port(interner.get_or_intern("A")).is_some());
        assert!(cell.find_port(interner.get_or_intern("B")).is_none());
        assert!(!cell.has_latch());
    }
}
