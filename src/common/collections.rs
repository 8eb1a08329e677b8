pub use std::collections::{BTreeMap, BTreeSet, VecDeque, btree_map, hash_map};

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<K> = rustc_hash::FxHashSet<K>;
