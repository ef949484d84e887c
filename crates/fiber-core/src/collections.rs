//! Hash maps used by the reconciler.
//!
//! List diffing indexes the old children by key (or by position when a
//! child has none) so each new element finds the fiber it can reuse in
//! constant time. Those keys are already `u64` hashes, so the faster
//! `hashbrown` table is used unless the `std-hash` feature asks for the
//! standard library one.

/// `HashMap` and `HashSet` for keyed child lookup and the unmatched set.
#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use hashbrown::{HashMap, HashSet};
}

/// Standard library maps, selected by the `std-hash` feature.
#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}
