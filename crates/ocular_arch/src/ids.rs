//! Opaque ID newtypes for routing-fabric entities.
//!
//! Each ID is a thin `u32` wrapper that is `Copy`, `Hash`, and `Serialize`/`Deserialize`.
//! These IDs reference wires, PIPs, nets, and cells within an architecture context.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Creates an ID from a raw `u32` index.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Returns the raw `u32` index.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

define_id!(
    /// Opaque, copyable ID for a routing wire in the device fabric.
    WireId
);

define_id!(
    /// Opaque, copyable ID for a programmable interconnect point (PIP) connecting wires.
    PipId
);

define_id!(
    /// Opaque, copyable ID for a net (a driver pin plus one or more sink pins).
    NetId
);
