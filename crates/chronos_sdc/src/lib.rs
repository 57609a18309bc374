//! Timing constraint data model.
//!
//! The SDC reader is an external collaborator; this crate defines the data
//! it must deliver: clocks with explicit waveforms, port delays, disables,
//! case analysis, derating factors, and path exceptions, plus the matching
//! and priority machinery the searches consume.

#![warn(missing_docs)]

pub mod clock;
pub mod derate;
pub mod exceptions;
pub mod sdc;

pub use clock::{Clock, ClockEdge, ClockId, ClockUncertainties};
pub use derate::{DerateCategory, DeratePathKind, DerateTable, Derates};
pub use exceptions::{
    ExceptionId, ExceptionKind, ExceptionPath, ExceptionPt, ExceptionState,
};
pub use sdc::{AnalysisMode, CrprMode, DisabledSet, PortDelay, Sdc};
