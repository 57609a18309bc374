//! Arrival and required search over the timing graph.
//!
//! Arrivals at a vertex are discriminated by [`Tag`]s, interned tuples of
//! transition, analysis point, launching clock context, and exception
//! state, so one vertex carries many concurrent paths. The forward search
//! propagates tagged arrivals level by level; the backward search fills
//! requireds from the timing checks at endpoints; CRPR returns the shared
//! clock-tree pessimism; path groups rank the resulting endpoint slacks
//! for reporting.

#![warn(missing_docs)]

pub mod crpr;
pub mod path;
pub mod path_end;
pub mod path_enum;
pub mod path_groups;
pub mod search;
pub mod tag;

pub use crpr::crpr_credit;
pub use path::{Path, PathRef, PathStore, PrevPath};
pub use path_end::{PathEnd, PathEndKind};
pub use path_enum::enumerate_path_ends;
pub use path_groups::{PathGroups, ReportSpec};
pub use search::{Search, SearchContext};
pub use tag::{ClkInfo, ClkInfoId, Tag, TagDb, TagGroup, TagGroupId, TagId};
