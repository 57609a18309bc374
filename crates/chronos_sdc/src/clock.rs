//! Clock definitions with explicit waveform edges.

use chronos_common::{Ident, MinMax, RiseFall};
use chronos_netlist::PinId;
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an id from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }

            /// Returns the index as `usize` for table addressing.
            pub fn as_usize(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(
    /// A clock in the constraint set.
    ClockId
);

/// Setup/hold uncertainty attached to a clock or clock pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClockUncertainties {
    /// Uncertainty subtracted from setup slack.
    pub setup: Option<f64>,
    /// Uncertainty subtracted from hold slack.
    pub hold: Option<f64>,
}

impl ClockUncertainties {
    /// The uncertainty for a check direction: `Max` reads setup, `Min`
    /// reads hold.
    pub fn value(&self, min_max: MinMax) -> f64 {
        match min_max {
            MinMax::Max => self.setup.unwrap_or(0.0),
            MinMax::Min => self.hold.unwrap_or(0.0),
        }
    }
}

/// A clock definition (`create_clock` / `create_generated_clock`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clock {
    /// This clock's id.
    pub id: ClockId,
    /// Clock name.
    pub name: Ident,
    /// Period in engine time units.
    pub period: f64,
    /// Waveform: time of the rise edge and the fall edge within the
    /// period. A 50% duty clock starting low is `[0, period/2]`.
    pub waveform: [f64; 2],
    /// Source pins; each seeds a clock arrival.
    pub source_pins: Vec<PinId>,
    /// True if clock-tree latency is propagated rather than ideal.
    pub is_propagated: bool,
    /// True for generated clocks.
    pub is_generated: bool,
    /// Master clock of a generated clock.
    pub master: Option<ClockId>,
    /// Ideal-mode source latency per min/max.
    pub latency: [f64; 2],
    /// Source insertion delay per min/max.
    pub insertion: [f64; 2],
    /// Per-clock uncertainty.
    pub uncertainty: ClockUncertainties,
}

impl Clock {
    /// Creates a clock with a default 50% waveform and no latencies.
    pub fn new(id: ClockId, name: Ident, period: f64, source_pins: Vec<PinId>) -> Self {
        Self {
            id,
            name,
            period,
            waveform: [0.0, period / 2.0],
            source_pins,
            is_propagated: false,
            is_generated: false,
            master: None,
            latency: [0.0; 2],
            insertion: [0.0; 2],
            uncertainty: ClockUncertainties::default(),
        }
    }

    /// The time of the given edge within the first period.
    pub fn edge_time(&self, rf: RiseFall) -> f64 {
        self.waveform[rf.index()]
    }

    /// Ideal latency for an analysis pole.
    pub fn latency(&self, min_max: MinMax) -> f64 {
        self.latency[min_max.index()]
    }

    /// Source insertion delay for an analysis pole.
    pub fn insertion(&self, min_max: MinMax) -> f64 {
        self.insertion[min_max.index()]
    }
}

/// One edge of a clock: the (clock, transition) pair tags and checks are
/// keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClockEdge {
    /// The clock.
    pub clock: ClockId,
    /// Which edge.
    pub rf: RiseFall,
}

impl ClockEdge {
    /// Creates a clock edge.
    pub fn new(clock: ClockId, rf: RiseFall) -> Self {
        Self { clock, rf }
    }
}
