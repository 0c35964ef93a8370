#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};

    pub type BuildHasher = std::collections::hash_map::RandomState;
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

    pub type BuildHasher = rustc_hash::FxBuildHasher;
}

/// Insertion-ordered map using the runtime's hasher.
pub type IndexMap<K, V> = indexmap::IndexMap<K, V, map::BuildHasher>;
