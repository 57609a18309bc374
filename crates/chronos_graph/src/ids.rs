//! Typed ids for timing graph entities.

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
    /// A vertex in the timing graph: one driver or load side of a pin.
    VertexId
);

define_id!(
    /// An edge in the timing graph: one (from, to, arc set) triple.
    EdgeId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let v = VertexId::from_raw(12);
        assert_eq!(v.as_raw(), 12);
        let e = EdgeId::from_raw(7);
        assert_eq!(e.as_usize(), 7);
    }

    #[test]
    fn ordering() {
        assert!(VertexId::from_raw(0) < VertexId::from_raw(1));
    }

    #[test]
    fn serde_roundtrip() {
        let id = EdgeId::from_raw(3);
        let json = serde_json::to_string(&id).unwrap();
        let back: EdgeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
