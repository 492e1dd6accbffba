//! Map aliases shared by the talkterm crates.
//!
//! Keys here are screen ids, buffer rows and key chords, all small and
//! hashed often, so maps use the Fx hasher.

pub use rustc_hash::{FxBuildHasher, FxHashMap};

/// Fx-hashed map that iterates in insertion order. The screen registry
/// keeps tabs in one so "next" and "previous" follow opening order.
pub type IndexMap<K, V> = indexmap::IndexMap<K, V, FxBuildHasher>;
