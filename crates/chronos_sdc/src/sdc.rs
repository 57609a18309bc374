//! The constraint aggregate: clocks, port delays, disables, case analysis,
//! exceptions, derates, and analysis configuration.

use crate::clock::{Clock, ClockEdge, ClockId};
use crate::derate::Derates;
use crate::exceptions::{ExceptionId, ExceptionKind, ExceptionPath, ExceptionPt};
use chronos_common::{Ident, LogicValue, MinMax, RiseFall};
use chronos_netlist::{CellId, InstanceId, PinId, PortId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The operating-conditions analysis style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisMode {
    /// One corner for both min and max.
    Single,
    /// Best-case / worst-case: min reads the fast corner, max the slow.
    BcWc,
    /// On-chip variation: both corners contribute to both checks.
    Ocv,
}

/// Clock-reconvergence-pessimism removal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrprMode {
    /// No credit.
    Disabled,
    /// Credit when launch and capture share a clock pin, regardless of
    /// transition.
    SamePin,
    /// Credit only when they also share the transition.
    SameTransition,
}

/// `set_input_delay` / `set_output_delay` on a port pin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortDelay {
    /// The constrained pin.
    pub pin: PinId,
    /// Governing clock edge; `None` constrains against all clocks.
    pub clock_edge: Option<ClockEdge>,
    /// Reference pin: its arrival substitutes for the clock edge time.
    pub reference_pin: Option<PinId>,
    /// The external delay per min/max.
    pub delay: [f64; 2],
}

impl PortDelay {
    /// The delay for an analysis pole.
    pub fn delay(&self, min_max: MinMax) -> f64 {
        self.delay[min_max.index()]
    }
}

/// Accumulated `set_disable_timing` state. Disabling is additive: any
/// matching scope disables the edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisabledSet {
    /// Disabled pins (all edges from or to the pin).
    pub pins: HashSet<PinId>,
    /// Disabled (from pin, to pin) edges.
    pub edges: HashSet<(PinId, PinId)>,
    /// Disabled instances (all internal arcs).
    pub instances: HashSet<InstanceId>,
    /// Disabled (cell, from port, to port) arcs, library-wide.
    pub cell_arcs: HashSet<(CellId, PortId, PortId)>,
    /// Disabled hierarchical pins (all edges crossing them).
    pub hier_pins: HashSet<PinId>,
}

impl DisabledSet {
    /// True if a gate edge is disabled by any scope.
    pub fn gate_edge_disabled(
        &self,
        from_pin: PinId,
        to_pin: PinId,
        instance: InstanceId,
        cell: CellId,
        from_port: PortId,
        to_port: PortId,
    ) -> bool {
        self.pins.contains(&from_pin)
            || self.pins.contains(&to_pin)
            || self.edges.contains(&(from_pin, to_pin))
            || self.instances.contains(&instance)
            || self.cell_arcs.contains(&(cell, from_port, to_port))
    }

    /// True if a wire edge is disabled by any scope.
    pub fn wire_edge_disabled(&self, from_pin: PinId, to_pin: PinId) -> bool {
        self.pins.contains(&from_pin)
            || self.pins.contains(&to_pin)
            || self.edges.contains(&(from_pin, to_pin))
    }
}

/// The full constraint set delivered by the SDC collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sdc {
    /// Clock definitions, indexed by `ClockId`.
    pub clocks: Vec<Clock>,
    /// Input delays.
    pub input_delays: Vec<PortDelay>,
    /// Output delays.
    pub output_delays: Vec<PortDelay>,
    /// Path exceptions, indexed by `ExceptionId`.
    pub exceptions: Vec<ExceptionPath>,
    /// Asynchronous clock groups (`set_clock_groups -asynchronous`): each
    /// entry is one command's group lists; clocks in different lists of
    /// the same entry are never timed against each other.
    pub async_clock_groups: Vec<Vec<Vec<ClockId>>>,
    /// Disable state.
    pub disables: DisabledSet,
    /// Case-analysis values to pin onto the network.
    pub case_values: Vec<(PinId, LogicValue)>,
    /// Derating factors.
    pub derates: Derates,
    /// Analysis style.
    pub analysis_mode: AnalysisMode,
    /// CRPR mode.
    pub crpr_mode: CrprMode,
    /// Give unconstrained inputs a synthetic default arrival clock.
    pub use_default_arrival_clock: bool,
    /// Propagate clocks through tristate enables with unknown values.
    /// A constant-disabled enable always kills clock propagation.
    pub clk_thru_tristate: bool,
    /// Search through the internal driver-to-load paths of bidirect pins.
    pub bidirect_inst_paths_enabled: bool,
    /// Report unconstrained endpoints.
    pub report_unconstrained_paths: bool,
    /// Equal-priority exception tie-break: prefer registration order
    /// instead of the more-specific-match rule.
    pub prefer_first_exception: bool,
    /// Latch borrowing fixed-point iteration cap.
    pub latch_borrow_iteration_limit: u32,
}

impl Default for Sdc {
    fn default() -> Self {
        Self {
            clocks: Vec::new(),
            input_delays: Vec::new(),
            output_delays: Vec::new(),
            exceptions: Vec::new(),
            async_clock_groups: Vec::new(),
            disables: DisabledSet::default(),
            case_values: Vec::new(),
            derates: Derates::new(),
            analysis_mode: AnalysisMode::Single,
            crpr_mode: CrprMode::Disabled,
            use_default_arrival_clock: false,
            clk_thru_tristate: true,
            bidirect_inst_paths_enabled: false,
            report_unconstrained_paths: false,
            prefer_first_exception: false,
            latch_borrow_iteration_limit: 10,
        }
    }
}

impl Sdc {
    /// Creates an empty constraint set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The clock with the given id.
    pub fn clock(&self, id: ClockId) -> &Clock {
        &self.clocks[id.as_usize()]
    }

    /// Finds a clock by name.
    pub fn find_clock(&self, name: Ident) -> Option<&Clock> {
        self.clocks.iter().find(|c| c.name == name)
    }

    /// Defines a clock and returns its id.
    pub fn make_clock(&mut self, name: Ident, period: f64, source_pins: Vec<PinId>) -> ClockId {
        let id = ClockId::from_raw(self.clocks.len() as u32);
        self.clocks.push(Clock::new(id, name, period, source_pins));
        id
    }

    /// Adds an exception and returns its id.
    pub fn make_exception(
        &mut self,
        kind: ExceptionKind,
        from: Option<ExceptionPt>,
        thrus: Vec<ExceptionPt>,
        to: Option<ExceptionPt>,
        min_max: Option<MinMax>,
    ) -> ExceptionId {
        let id = ExceptionId::from_raw(self.exceptions.len() as u32);
        self.exceptions.push(ExceptionPath {
            id,
            kind,
            from,
            thrus,
            to,
            min_max,
        });
        id
    }

    /// The exception with the given id.
    pub fn exception(&self, id: ExceptionId) -> &ExceptionPath {
        &self.exceptions[id.as_usize()]
    }

    /// The time of a clock edge within the first period.
    pub fn clock_edge_time(&self, edge: ClockEdge) -> f64 {
        self.clock(edge.clock).edge_time(edge.rf)
    }

    /// True if any clock lists `pin` as a source.
    pub fn is_clock_source(&self, pin: PinId) -> bool {
        self.clocks.iter().any(|c| c.source_pins.contains(&pin))
    }

    /// Clocks sourced at `pin`.
    pub fn clocks_on_pin(&self, pin: PinId) -> Vec<ClockId> {
        self.clocks
            .iter()
            .filter(|c| c.source_pins.contains(&pin))
            .map(|c| c.id)
            .collect()
    }

    /// The input delays constraining `pin`.
    pub fn input_delays_on(&self, pin: PinId) -> impl Iterator<Item = &PortDelay> {
        self.input_delays.iter().filter(move |d| d.pin == pin)
    }

    /// The output delays constraining `pin`.
    pub fn output_delays_on(&self, pin: PinId) -> impl Iterator<Item = &PortDelay> {
        self.output_delays.iter().filter(move |d| d.pin == pin)
    }

    /// True if the two clocks belong to different groups of an
    /// asynchronous clock-group command; checks between them are skipped.
    pub fn clocks_asynchronous(&self, a: ClockId, b: ClockId) -> bool {
        if a == b {
            return false;
        }
        self.async_clock_groups.iter().any(|groups| {
            let group_of = |clk: ClockId| groups.iter().position(|g| g.contains(&clk));
            match (group_of(a), group_of(b)) {
                (Some(ga), Some(gb)) => ga != gb,
                _ => false,
            }
        })
    }

    /// Picks the governing exception among complete candidates, per the
    /// priority order and the configured tie-break.
    pub fn highest_priority_exception<'a>(
        &self,
        candidates: &[&'a ExceptionPath],
    ) -> Option<&'a ExceptionPath> {
        if self.prefer_first_exception {
            candidates
                .iter()
                .max_by(|a, b| {
                    a.kind
                        .priority()
                        .cmp(&b.kind.priority())
                        .then(b.id.cmp(&a.id))
                })
                .copied()
        } else {
            candidates.iter().max_by(|a, b| a.priority_cmp(b)).copied()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronos_common::Interner;

    #[test]
    fn default_config() {
        let sdc = Sdc::new();
        assert_eq!(sdc.analysis_mode, AnalysisMode::Single);
        assert_eq!(sdc.crpr_mode, CrprMode::Disabled);
        assert_eq!(sdc.latch_borrow_iteration_limit, 10);
        assert!(sdc.clk_thru_tristate);
    }

    #[test]
    fn make_and_find_clock() {
        let interner = Interner::new();
        let mut sdc = Sdc::new();
        let name = interner.get_or_intern("clk");
        let id = sdc.make_clock(name, 10.0, vec![PinId::from_raw(0)]);
        assert_eq!(sdc.clock(id).period, 10.0);
        assert!(sdc.find_clock(name).is_some());
        assert!(sdc.is_clock_source(PinId::from_raw(0)));
        assert!(!sdc.is_clock_source(PinId::from_raw(1)));
        assert_eq!(sdc.clocks_on_pin(PinId::from_raw(0)), vec![id]);
    }

    #[test]
    fn clock_edge_times() {
        let interner = Interner::new();
        let mut sdc = Sdc::new();
        let id = sdc.make_clock(interner.get_or_intern("clk"), 10.0, vec![]);
        assert_eq!(
            sdc.clock_edge_time(ClockEdge::new(id, RiseFall::Rise)),
            0.0
        );
        assert_eq!(
            sdc.clock_edge_time(ClockEdge::new(id, RiseFall::Fall)),
            5.0
        );
    }

    #[test]
    fn disables_are_additive() {
        let mut disables = DisabledSet::default();
        let from = PinId::from_raw(1);
        let to = PinId::from_raw(2);
        assert!(!disables.wire_edge_disabled(from, to));
        disables.pins.insert(from);
        assert!(disables.wire_edge_disabled(from, to));
        disables.pins.remove(&from);
        disables.edges.insert((from, to));
        assert!(disables.wire_edge_disabled(from, to));
        assert!(!disables.wire_edge_disabled(to, from));
    }

    #[test]
    fn gate_disable_by_cell_arc() {
        let mut disables = DisabledSet::default();
        let cell = CellId::from_raw(0);
        let a = PortId::from_raw(0);
        let z = PortId::from_raw(1);
        disables.cell_arcs.insert((cell, a, z));
        assert!(disables.gate_edge_disabled(
            PinId::from_raw(1),
            PinId::from_raw(2),
            InstanceId::from_raw(0),
            cell,
            a,
            z
        ));
    }

    #[test]
    fn highest_priority_exception_order() {
        let mut sdc = Sdc::new();
        let fp = sdc.make_exception(ExceptionKind::FalsePath, None, vec![], None, None);
        let mc = sdc.make_exception(
            ExceptionKind::Multicycle {
                cycles: 2,
                hold: false,
            },
            None,
            vec![],
            None,
            None,
        );
        let candidates = vec![sdc.exception(mc), sdc.exception(fp)];
        let winner = sdc.highest_priority_exception(&candidates).unwrap();
        assert_eq!(winner.id, fp);
    }

    #[test]
    fn asynchronous_clock_groups() {
        let interner = Interner::new();
        let mut sdc = Sdc::new();
        let a = sdc.make_clock(interner.get_or_intern("clk_a"), 10.0, vec![]);
        let b = sdc.make_clock(interner.get_or_intern("clk_b"), 8.0, vec![]);
        let c = sdc.make_clock(interner.get_or_intern("clk_c"), 5.0, vec![]);
        assert!(!sdc.clocks_asynchronous(a, b));
        sdc.async_clock_groups.push(vec![vec![a], vec![b]]);
        assert!(sdc.clocks_asynchronous(a, b));
        assert!(sdc.clocks_asynchronous(b, a));
        assert!(!sdc.clocks_asynchronous(a, a));
        // A clock outside every group is synchronous to all.
        assert!(!sdc.clocks_asynchronous(a, c));
    }

    #[test]
    fn port_delay_per_pole() {
        let d = PortDelay {
            pin: PinId::from_raw(0),
            clock_edge: None,
            reference_pin: None,
            delay: [0.5, 1.5],
        };
        assert_eq!(d.delay(MinMax::Min), 0.5);
        assert_eq!(d.delay(MinMax::Max), 1.5);
    }
}
