//! Min/max analysis poles for delay, slew, and slack arithmetic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One pole of the min/max analysis axis.
///
/// Every delay, arrival, and slew in the engine is stored per analysis point,
/// and each analysis point is associated with one pole. `Max` drives setup
/// (late) analysis, `Min` drives hold (early) analysis. Merge and compare
/// operations are parameterised by the pole so the same search code serves
/// both directions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum MinMax {
    /// Early/fast pole: smaller values are worse-case.
    Min,
    /// Late/slow pole: larger values are worse-case.
    Max,
}

/// Derating and check margins distinguish early from late rather than
/// min from max; the poles coincide.
pub type EarlyLate = MinMax;

impl MinMax {
    /// Number of poles.
    pub const COUNT: usize = 2;

    /// Both poles, in index order.
    pub const ALL: [MinMax; 2] = [MinMax::Min, MinMax::Max];

    /// Dense index for side-array addressing: `Min` is 0, `Max` is 1.
    pub fn index(self) -> usize {
        match self {
            MinMax::Min => 0,
            MinMax::Max => 1,
        }
    }

    /// The opposite pole.
    pub fn opposite(self) -> Self {
        match self {
            MinMax::Min => MinMax::Max,
            MinMax::Max => MinMax::Min,
        }
    }

    /// The identity value for [`worst_of`](Self::worst_of): any real value
    /// is further toward this pole than the init value.
    pub fn init_value(self) -> f64 {
        match self {
            MinMax::Min => f64::INFINITY,
            MinMax::Max => f64::NEG_INFINITY,
        }
    }

    /// True if `a` is strictly further toward this pole than `b`
    /// (`a > b` for `Max`, `a < b` for `Min`).
    pub fn is_beyond(self, a: f64, b: f64) -> bool {
        match self {
            MinMax::Min => a < b,
            MinMax::Max => a > b,
        }
    }

    /// The value further toward this pole.
    pub fn worst_of(self, a: f64, b: f64) -> f64 {
        if self.is_beyond(a, b) {
            a
        } else {
            b
        }
    }

    /// The value further from this pole (toward the opposite).
    pub fn best_of(self, a: f64, b: f64) -> f64 {
        if self.is_beyond(a, b) {
            b
        } else {
            a
        }
    }
}

impl fmt::Display for MinMax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinMax::Min => write!(f, "min"),
            MinMax::Max => write!(f, "max"),
        }
    }
}
