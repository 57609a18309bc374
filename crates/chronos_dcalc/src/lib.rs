//! Delay calculation: the per-driver arc delay contract and the
//! level-ordered graph traversal that drives it.
//!
//! [`ArcDelayCalc`] is the seam between the core and concrete delay
//! models: given an input slew and a load, produce a gate delay, driver
//! slew, and per-load wire delays. [`GraphDelayCalc`] walks the graph in
//! ascending level order, invokes the calculator once per driver, writes
//! the results into the graph's side arrays, and tracks the dirty frontier
//! for incremental recalculation.

#![warn(missing_docs)]

pub mod delay_calc;
pub mod graph_dcalc;

pub use delay_calc::{ArcDelayCalc, DriverLoads, GateDelayResult, LumpedCapDelayCalc};
pub use graph_dcalc::{AnalysisPt, DelayContext, GraphDelayCalc};
