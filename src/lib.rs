//! Umbrella crate for the treeline point-cloud indexing core.
//!
//! Everything lives in two member crates: `treeline-core` holds the
//! foundational value types (the arbitrary-precision tree index, geometry,
//! point schemas, and the shared point pool), and `treeline-index` holds the
//! tree itself (structure, climbers, tubes, chunks, and persistence). This
//! crate just re-exports both.

pub use treeline_core::*;
pub use treeline_index::*;
