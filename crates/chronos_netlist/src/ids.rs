//! Typed id newtypes for netlist and library tables.

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
    /// A liberty cell in the library table.
    CellId
);

define_id!(
    /// A liberty port within its owning cell's port table.
    PortId
);

define_id!(
    /// A timing arc set within its owning cell.
    ArcSetId
);

define_id!(
    /// An instance in the network.
    InstanceId
);

define_id!(
    /// A pin in the network. Pin ids are dense and assigned in creation
    /// order; deterministic orderings throughout the core sort by pin id.
    PinId
);

define_id!(
    /// A net in the network.
    NetId
);
