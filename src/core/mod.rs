pub mod error;
pub mod jacobian_cache;
pub mod jacobian_chain;
pub mod key;
pub mod loss_function;
pub mod params;
pub mod residual;
pub mod variable;

/// Map keyed by values that already are unique integers (state keys, point ids).
pub type HashMap<K, V> = hashbrown::HashMap<K, V, nohash_hasher::BuildNoHashHasher<K>>;
