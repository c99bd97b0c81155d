//! Strongly typed index wrappers.
//!
//! Node and edge ids are dense positions (`0..N`, `0..E`) into the network's
//! arrays; cluster ids are dense positions `0..Z`.  The inner integer is
//! `pub` so hot loops can index directly, but `.index()` reads better.

use std::fmt;

/// Generate a typed index wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel for "no id", e.g. the parent edge of a search root.
            pub const INVALID: $name = $name(<$inner>::MAX);

            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline(always)]
            pub fn is_valid(self) -> bool {
                self != Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<$name> for usize {
            #[inline(always)]
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

typed_id! {
    /// Dense index of a network node (`0..node_count`).
    pub struct NodeId(u32);
}

typed_id! {
    /// Dense index of a directed network edge (`0..edge_count`).
    ///
    /// Edge ids follow insertion order and never change once assigned, so
    /// they double as row indices of the traffic assignment matrix.
    pub struct EdgeId(u32);
}

typed_id! {
    /// Cluster id in `0..num_clusters`.
    pub struct ClusterId(u32);
}

// ── OdPair ────────────────────────────────────────────────────────────────────

/// An ordered (origin cluster, destination cluster) pair.
///
/// Flattened origin-major: `column = origin * Z + destination`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OdPair {
    pub origin:      ClusterId,
    pub destination: ClusterId,
}

impl OdPair {
    #[inline]
    pub fn new(origin: ClusterId, destination: ClusterId) -> Self {
        Self { origin, destination }
    }

    /// Column index of this pair in a `Z²`-wide matrix.
    #[inline]
    pub fn column(self, num_clusters: usize) -> usize {
        self.origin.index() * num_clusters + self.destination.index()
    }

    /// Inverse of [`column`](Self::column).
    #[inline]
    pub fn from_column(column: usize, num_clusters: usize) -> Self {
        Self {
            origin:      ClusterId((column / num_clusters) as u32),
            destination: ClusterId((column % num_clusters) as u32),
        }
    }

    /// `true` for intra-cluster pairs, whose paths are empty.
    #[inline]
    pub fn is_diagonal(self) -> bool {
        self.origin == self.destination
    }
}

impl fmt::Display for OdPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.origin.0, self.destination.0)
    }
}
