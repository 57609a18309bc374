//! Shared foundational types for the chronos timing engine.
//!
//! This crate provides interned identifiers, the min/max analysis poles used
//! throughout delay and slack arithmetic, rise/fall transitions, constant
//! logic values from case analysis, delay scalar helpers, and the internal
//! result type.

#![warn(missing_docs)]

pub mod delay;
pub mod ident;
pub mod logic;
pub mod min_max;
pub mod result;
pub mod transition;

pub use delay::{fuzzy_equal, fuzzy_zero, Arrival, Delay, Required, Slack};
pub use ident::{Ident, Interner};
pub use logic::LogicValue;
pub use min_max::{EarlyLate, MinMax};
pub use result::{ChronosResult, InternalError};
pub use transition::RiseFall;
