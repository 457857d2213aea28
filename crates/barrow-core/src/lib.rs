pub mod geometry;
pub mod transform;
pub mod units;

use ahash::{AHashMap, AHashSet};
pub type SmallKeyHashMap<K, V> = AHashMap<K, V>;
pub type SmallKeyHashSet<K> = AHashSet<K>;

// Re-exports.
pub use approx;
pub use ilattice::glam as glam;
pub use ilattice;
pub use static_assertions;

/// Threshold below which a direction component or a determinant is treated as zero.
pub const EPSILON: f64 = 1e-12;
