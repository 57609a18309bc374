//! The programmatic façade of the chronos timing engine.
//!
//! [`Sta`] owns the collaborators (network, library, constraints,
//! parasitics) and the core state (graph, delay calculator, search). It
//! sequences graph construction, levelisation, delay calculation, and the
//! searches behind [`update_timing`](Sta::update_timing), exposes the
//! incremental invalidation entry points for annotation and constraint
//! edits, and turns endpoint arrivals into ranked, grouped path reports.
//!
//! ```ignore
//! let mut sta = Sta::new(interner, network, library);
//! sta.sdc.make_clock(clk_name, 10.0, vec![clk_pin]);
//! sta.update_timing(true)?;
//! let groups = sta.find_path_ends(&ReportSpec::default())?;
//! ```

#![warn(missing_docs)]

pub mod report;
pub mod sta;

pub use report::{expand_path, PathStep, TimingSummary};
pub use sta::Sta;
