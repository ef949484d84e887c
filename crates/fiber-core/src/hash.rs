//! Reduction of element keys and effect dependencies to a single word.
//!
//! `ElementBuilder::key` and `Deps::keys` accept any `Hash` value. Fibers
//! keep only the `u64` it hashes to, so matching a child by key and
//! deciding whether an effect re-runs are both one integer comparison, and
//! neither the element nor the hook slot has to own a boxed copy of the
//! caller's value. Values with equal hashes count as the same key.
//!
//! The hash is stable for the life of the process. It is not meant to be
//! persisted.

use std::hash::{Hash, Hasher};

#[cfg(not(feature = "std-hash"))]
type KeyHasher = ahash::AHasher;

#[cfg(feature = "std-hash")]
type KeyHasher = std::collections::hash_map::DefaultHasher;

/// Hashes `value` into the `u64` stored as a fiber key or a deps snapshot.
#[inline]
pub fn hash_one<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = KeyHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
#[path = "tests/hash_tests.rs"]
mod tests;
