pub mod geometry;
pub mod pool;
pub mod schema;
pub mod tree_index;

pub use geometry::*;
pub use pool::*;
pub use schema::*;
pub use tree_index::*;

use ahash::{AHashMap, AHashSet};
pub type SmallKeyHashMap<K, V> = AHashMap<K, V>;
pub type SmallKeyHashSet<K> = AHashSet<K>;

// Re-exports.
pub use approx;
pub use smallvec;
pub use static_assertions;
