//! The per-driver delay calculation contract and the lumped-cap
//! implementation.

use chronos_common::Delay;
use chronos_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink};
use chronos_netlist::{Parasitic, ParasiticForm, PinId, TimingArc};

/// The result of one gate-delay evaluation for one arc at one analysis
/// point: the delay through the gate, the slew at the driver pin, and the
/// wire delay and slew at each load, indexed by the driver's load map.
#[derive(Debug, Clone, PartialEq)]
pub struct GateDelayResult {
    /// Delay through the gate arc.
    pub gate_delay: Delay,
    /// Slew at the driver output.
    pub drvr_slew: f64,
    /// Wire delay from driver to each load.
    pub wire_delays: Vec<Delay>,
    /// Slew at each load.
    pub load_slews: Vec<f64>,
}

/// The load a driver sees: the net parasitic (if annotated) plus the
/// liberty pin capacitance of each load, in load-map order.
#[derive(Debug, Clone, Copy)]
pub struct DriverLoads<'a> {
    /// Parasitic annotated on the driven net, if any.
    pub parasitic: Option<&'a Parasitic>,
    /// Load pins in load-map order.
    pub load_pins: &'a [PinId],
    /// Liberty pin capacitance per load, same order.
    pub pin_caps: &'a [f64],
}

impl DriverLoads<'_> {
    /// Total pin capacitance.
    pub fn total_pin_cap(&self) -> f64 {
        self.pin_caps.iter().sum()
    }
}

/// The delay calculation seam.
///
/// Implementations never fail: degenerate inputs (zero cap, off-table
/// points) clamp to the nearest characterised cell, and unsupported
/// parasitic forms fall back to a lumped capacitance with a one-time
/// warning through the sink.
pub trait ArcDelayCalc: Send + Sync {
    /// The parasitic form this calculator consumes; the graph delay
    /// calculator pre-reduces annotations to this form.
    fn reduce_supported(&self) -> ParasiticForm;

    /// Computes the delay and slews for one gate arc driving `loads`.
    fn gate_delay(
        &self,
        arc: &TimingArc,
        input_slew: f64,
        loads: &DriverLoads<'_>,
        sink: &DiagnosticSink,
    ) -> GateDelayResult;

    /// Wire delays and load slews for an input port with no driving cell.
    fn input_port_delay(
        &self,
        input_slew: f64,
        loads: &DriverLoads<'_>,
        sink: &DiagnosticSink,
    ) -> GateDelayResult;

    /// The margin of a timing check arc. The check model is keyed by the
    /// related (clock) pin slew and the constrained (data) pin slew.
    fn check_delay(
        &self,
        arc: &TimingArc,
        from_slew: f64,
        to_slew: f64,
        related_out_cap: f64,
    ) -> Delay;
}

/// Lumped-capacitance delay calculator.
///
/// The entire net load is a single capacitance; wire delays are zero and
/// every load sees the driver slew. π-models and RC networks reduce to
/// their total capacitance with a one-time warning per net form.
#[derive(Debug, Default)]
pub struct LumpedCapDelayCalc;

impl LumpedCapDelayCalc {
    /// Creates the calculator.
    pub fn new() -> Self {
        Self
    }

    fn load_cap(&self, loads: &DriverLoads<'_>, sink: &DiagnosticSink) -> f64 {
        let wire_cap = match loads.parasitic {
            None => 0.0,
            Some(parasitic) => {
                if parasitic.form() != ParasiticForm::LumpedCap {
                    sink.emit_once(
                        Diagnostic::warning(
                            DiagnosticCode::new(Category::Delay, 10),
                            format!(
                                "unsupported parasitic form {:?}; using total capacitance",
                                parasitic.form()
                            ),
                        ),
                    );
                }
                parasitic.total_cap()
            }
        };
        wire_cap + loads.total_pin_cap()
    }
}

impl ArcDelayCalc for LumpedCapDelayCalc {
    fn reduce_supported(&self) -> ParasiticForm {
        ParasiticForm::LumpedCap
    }

    fn gate_delay(
        &self,
        arc: &TimingArc,
        input_slew: f64,
        loads: &DriverLoads<'_>,
        sink: &DiagnosticSink,
    ) -> GateDelayResult {
        let cap = self.load_cap(loads, sink);
        let gate_delay = arc.delay.value(input_slew, cap);
        let drvr_slew = arc
            .slew
            .as_ref()
            .map_or(input_slew, |model| model.value(input_slew, cap));
        GateDelayResult {
            gate_delay,
            drvr_slew,
            wire_delays: vec![0.0; loads.load_pins.len()],
            load_slews: vec![drvr_slew; loads.load_pins.len()],
        }
    }

    fn input_port_delay(
        &self,
        input_slew: f64,
        loads: &DriverLoads<'_>,
        _sink: &DiagnosticSink,
    ) -> GateDelayResult {
        GateDelayResult {
            gate_delay: 0.0,
            drvr_slew: input_slew,
            wire_delays: vec![0.0; loads.load_pins.len()],
            load_slews: vec![input_slew; loads.load_pins.len()],
        }
    }

    fn check_delay(
        &self,
        arc: &TimingArc,
        from_slew: f64,
        to_slew: f64,
        _related_out_cap: f64,
    ) -> Delay {
        // Check tables are keyed (related pin slew, constrained pin slew).
        arc.delay.value(from_slew, to_slew)
    }
}
