//! Collaborator data models consumed read-only by the timing core.
//!
//! The core does not parse netlists, liberty libraries, or SPEF; external
//! layers deliver linked data through the types in this crate:
//!
//! - [`liberty`]: cells, ports, timing arc sets, delay models, units
//! - [`network`]: instances, pins, nets, hierarchy, constants
//! - [`parasitics`]: per-net lumped cap, π-model, or RC tree, with
//!   on-demand reduction
//!
//! All tables are index-addressed with typed ids; the network is immutable
//! after linking except for the edit operations that notify the core.

#![warn(missing_docs)]

pub mod ids;
pub mod liberty;
pub mod network;
pub mod parasitics;

pub use ids::{ArcSetId, CellId, InstanceId, NetId, PinId, PortId};
pub use liberty::{
    DelayModel, FuncExpr, Library, LibertyCell, LibertyPort, PortDirection, Sequential,
    SequentialKind, TableModel, TimingArc, TimingArcSet, TimingRole, TimingSense, Units,
};
pub use network::{Instance, Net, Network, Pin, PinKind};
pub use parasitics::{Parasitic, ParasiticForm, Parasitics};
