//! The treeline storage and indexing core.
//!
//! # The tree
//!
//! Billions of points are organized into a hierarchical spatial tree (an
//! octree in 3D mode, a quadtree in 2D mode) addressed by flattened
//! [`TreeIndex`](treeline_core::TreeIndex) positions. A [`Structure`]
//! describes the tree shape once at open time; [`Climber`]s map points to
//! tree positions one branch decision at a time, and [`SplitClimber`]s
//! enumerate chunk-sized regions overlapping a query without materializing
//! anything.
//!
//! # Chunks
//!
//! The tree is partitioned into [`Chunk`]s, each covering a contiguous index
//! range at one depth band. A chunk owns one [`Tube`] per spatial column and
//! one [`Cell`] per vertical bucket ("tick") within a column. Densely
//! populated bands use a contiguous tube array; deep, mostly-empty bands use
//! a sparse column map. Either layout serializes to the same lz4-framed wire
//! format and persists to an [`Endpoint`] with retry.

mod chunk;
mod climber;
mod compression;
mod endpoint;
mod error;
mod file_info;
mod files;
mod structure;
mod tube;

pub use chunk::*;
pub use climber::*;
pub use compression::*;
pub use endpoint::*;
pub use error::*;
pub use file_info::*;
pub use files::*;
pub use structure::*;
pub use tube::*;

// Re-export the foundational value types for downstream convenience.
pub use treeline_core as core;
