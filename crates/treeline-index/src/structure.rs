use serde::{Deserialize, Serialize};
use treeline_core::TreeIndex;

/// Tree-shape parameters, as persisted next to a build's manifest.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StructureParams {
    /// 2 for a quadtree, 3 for an octree.
    pub dimensions: u32,
    /// Point capacity of the base chunk; must be a power of the branching
    /// factor. Also fixes the nominal chunk depth.
    pub base_chunk_points: u64,
    /// Depth at which storage switches from contiguous to sparse; 0 disables
    /// sparse storage entirely.
    pub sparse_depth_begin: u64,
    /// Depth at which chunks are persisted remotely rather than kept purely
    /// in memory.
    pub cold_depth_begin: u64,
    /// Whether chunk boundaries keep subdividing past the nominal depth.
    pub dynamic_chunks: bool,
}

/// Immutable description of the tree shape, constructed once at tree-open
/// time and consulted by climbers and chunks ever after.
#[derive(Clone, Debug)]
pub struct Structure {
    params: StructureParams,
    factor: u64,
    nominal_chunk_depth: u64,
    nominal_chunk_index: TreeIndex,
    cold_index_begin: TreeIndex,
}

impl Structure {
    pub fn new(params: StructureParams) -> Self {
        assert!(
            params.dimensions == 2 || params.dimensions == 3,
            "dimensions must be 2 or 3"
        );
        let factor = 1u64 << params.dimensions;

        let mut nominal_chunk_depth = 0;
        let mut points = 1u64;
        while points < params.base_chunk_points {
            points *= factor;
            nominal_chunk_depth += 1;
        }
        assert_eq!(
            points, params.base_chunk_points,
            "base chunk points must be a power of the branching factor"
        );
        assert!(
            params.base_chunk_points >= factor,
            "base chunk must hold at least one full child generation"
        );
        assert!(
            params.sparse_depth_begin == 0
                || params.sparse_depth_begin >= params.cold_depth_begin,
            "sparse storage cannot begin before cold storage"
        );

        let nominal_chunk_index =
            Self::start_index_at_depth(params.dimensions, nominal_chunk_depth);
        let cold_index_begin =
            Self::start_index_at_depth(params.dimensions, params.cold_depth_begin);

        Self {
            params,
            factor,
            nominal_chunk_depth,
            nominal_chunk_index,
            cold_index_begin,
        }
    }

    pub fn params(&self) -> &StructureParams {
        &self.params
    }

    pub fn dimensions(&self) -> u32 {
        self.params.dimensions
    }

    /// The branching factor, `2^dimensions`.
    pub fn factor(&self) -> u64 {
        self.factor
    }

    pub fn is_3d(&self) -> bool {
        self.params.dimensions == 3
    }

    pub fn nominal_chunk_depth(&self) -> u64 {
        self.nominal_chunk_depth
    }

    pub fn sparse_depth_begin(&self) -> u64 {
        self.params.sparse_depth_begin
    }

    pub fn cold_depth_begin(&self) -> u64 {
        self.params.cold_depth_begin
    }

    pub fn base_chunk_points(&self) -> u64 {
        self.params.base_chunk_points
    }

    pub fn dynamic_chunks(&self) -> bool {
        self.params.dynamic_chunks
    }

    /// First index of the nominal chunk band.
    pub fn nominal_chunk_index(&self) -> &TreeIndex {
        &self.nominal_chunk_index
    }

    /// First index of the cold-storage band.
    pub fn cold_index_begin(&self) -> &TreeIndex {
        &self.cold_index_begin
    }

    /// First index at `depth`: repeated first-child steps from the root.
    pub fn start_index_at_depth(dimensions: u32, depth: u64) -> TreeIndex {
        let mut index = TreeIndex::zero();
        for _ in 0..depth {
            index <<= dimensions;
            index.incr();
        }
        index
    }

    /// Node count of one full level at `depth`.
    pub fn num_nodes_at_depth(dimensions: u32, depth: u64) -> TreeIndex {
        let mut nodes = TreeIndex::new(1);
        for _ in 0..depth {
            nodes <<= dimensions;
        }
        nodes
    }
}

/// Depth of `index`, recovered by repeated parent steps.
///
/// Used when a reconstructed chunk has no retained depth: every index a chunk
/// covers sits at the chunk's own depth, so the chunk id suffices.
pub fn calc_depth(dimensions: u32, mut index: TreeIndex) -> u64 {
    let mut depth = 0;
    while !index.is_zero() {
        index -= 1u64;
        index >>= dimensions;
        depth += 1;
    }
    depth
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
