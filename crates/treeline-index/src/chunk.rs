mod contiguous;
mod sparse;

pub use contiguous::ContiguousChunk;
pub use sparse::SparseChunk;

use crate::climber::Climber;
use crate::compression::decompress;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::structure::{calc_depth, Structure};
use crate::tube::{calc_tick, CellGuard};

use static_assertions::const_assert_eq;
use treeline_core::{Bounds, Point, PointPool, PooledPoint, Schema, TreeIndex, TUBE_ID_SIZE};

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Storage-type marker written as the very last byte of a serialized chunk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ChunkType {
    Sparse = 0,
    Contiguous = 1,
}

/// Fixed-size tail of the wire format: the resident point count, then the
/// type marker.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Trailer {
    pub num_points: u64,
    pub chunk_type: ChunkType,
}

pub const TRAILER_SIZE: usize = mem::size_of::<u64>() + 1;
const_assert_eq!(TRAILER_SIZE, 9);

pub fn push_trailer(data: &mut Vec<u8>, trailer: Trailer) {
    data.extend_from_slice(&trailer.num_points.to_le_bytes());
    data.push(trailer.chunk_type as u8);
}

/// Pop the trailer off the tail of `data`. Order matters: the type marker is
/// the very last byte written, so it comes off first.
pub fn pop_trailer(data: &mut Vec<u8>) -> Result<Trailer> {
    let marker = data.pop().ok_or(Error::TruncatedTrailer)?;
    let chunk_type = if marker == ChunkType::Sparse as u8 {
        ChunkType::Sparse
    } else if marker == ChunkType::Contiguous as u8 {
        ChunkType::Contiguous
    } else {
        return Err(Error::InvalidChunkType(marker));
    };

    if data.len() < mem::size_of::<u64>() {
        return Err(Error::TruncatedTrailer);
    }
    let at = data.len() - mem::size_of::<u64>();
    let mut count = [0u8; 8];
    count.copy_from_slice(&data[at..]);
    data.truncate(at);

    Ok(Trailer {
        num_points: u64::from_le_bytes(count),
        chunk_type,
    })
}

/// Process-scope accounting of resident point memory and live chunks.
///
/// Injected into every chunk rather than hidden in a global so independent
/// builds (and tests) get independent tallies. An external backpressure or
/// eviction controller reads these; chunks only ever write them.
#[derive(Debug, Default)]
pub struct Counters {
    chunk_mem: AtomicU64,
    chunk_cnt: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resident point bytes across all live chunks.
    pub fn chunk_mem(&self) -> u64 {
        self.chunk_mem.load(Ordering::Relaxed)
    }

    /// Live chunk count.
    pub fn chunk_cnt(&self) -> u64 {
        self.chunk_cnt.load(Ordering::Relaxed)
    }

    fn add_mem(&self, bytes: u64) {
        self.chunk_mem.fetch_add(bytes, Ordering::Relaxed);
    }

    fn sub_mem(&self, bytes: u64) {
        self.chunk_mem.fetch_sub(bytes, Ordering::Relaxed);
    }

    fn inc_cnt(&self) {
        self.chunk_cnt.fetch_add(1, Ordering::Relaxed);
    }

    fn dec_cnt(&self) {
        self.chunk_cnt.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Everything a chunk needs from its owning tree: the native point layout,
/// the full tree bounds, the tree shape, and the shared pool and accounting.
#[derive(Clone)]
pub struct ChunkContext {
    pub schema: Schema,
    pub bounds: Bounds,
    pub structure: Structure,
    pub pool: Arc<PointPool>,
    pub counters: Arc<Counters>,
}

/// State common to both chunk layouts.
pub(crate) struct ChunkCore {
    pub(crate) native: Schema,
    pub(crate) celled: Schema,
    pub(crate) bounds: Bounds,
    pub(crate) structure: Structure,
    pub(crate) pool: Arc<PointPool>,
    counters: Arc<Counters>,
    pub(crate) depth: u64,
    pub(crate) id: TreeIndex,
    pub(crate) max_points: u64,
    pub(crate) num_points: AtomicU64,
}

impl ChunkCore {
    pub(crate) fn new(
        ctx: &ChunkContext,
        depth: u64,
        id: TreeIndex,
        max_points: u64,
        num_points: u64,
    ) -> Self {
        let native = ctx.schema.clone();
        let celled = native.celled();

        ctx.counters.add_mem(num_points * native.point_size() as u64);
        ctx.counters.inc_cnt();

        Self {
            native,
            celled,
            bounds: ctx.bounds,
            structure: ctx.structure.clone(),
            pool: Arc::clone(&ctx.pool),
            counters: Arc::clone(&ctx.counters),
            depth,
            id,
            max_points,
            num_points: AtomicU64::new(num_points),
        }
    }

    /// Column index of `index` within this chunk. An index outside
    /// `[id, id + max_points)` is a caller bug.
    pub(crate) fn normalize(&self, index: &TreeIndex) -> u64 {
        assert!(*index >= self.id, "index below chunk range");
        let norm = (index - &self.id).simple();
        assert!(norm < self.max_points, "index beyond chunk range");
        norm
    }

    /// Depth for tick calculation. Every index a chunk covers sits at the
    /// chunk's own depth, so an unknown depth is recoverable from the id.
    pub(crate) fn effective_depth(&self) -> u64 {
        if self.depth != 0 {
            self.depth
        } else {
            calc_depth(self.structure.dimensions(), self.id.clone())
        }
    }

    /// Account for a cell transitioning from absent to present. Must happen
    /// at the transition, not deferred: the backpressure controller watches
    /// these tallies live.
    pub(crate) fn cell_added(&self) {
        self.counters.add_mem(self.native.point_size() as u64);
        self.num_points.fetch_add(1, Ordering::Relaxed);
    }

    /// Remote object path for this chunk.
    pub(crate) fn path(&self, postfix: &str) -> String {
        format!("{}{}", self.id, postfix)
    }
}

impl Drop for ChunkCore {
    fn drop(&mut self) {
        let resident = self.num_points.load(Ordering::Relaxed) * self.native.point_size() as u64;
        self.counters.sub_mem(resident);
        self.counters.dec_cnt();
    }
}

/// Decode the decompressed payload record by record, handing each column id,
/// pooled point, and recomputed tick to `place`.
pub(crate) fn each_record(
    core: &ChunkCore,
    compressed: &[u8],
    mut place: impl FnMut(u64, PooledPoint, u64) -> Result<()>,
) -> Result<()> {
    let celled_size = core.celled.point_size();
    let count = core.num_points.load(Ordering::Relaxed) as usize;
    let raw = decompress(compressed, count * celled_size)?;
    let depth = core.effective_depth();

    for record in raw.chunks_exact(celled_size) {
        let mut column = [0u8; TUBE_ID_SIZE];
        column.copy_from_slice(&record[..TUBE_ID_SIZE]);
        let column = u64::from_le_bytes(column);
        if column >= core.max_points {
            return Err(Error::ColumnOutOfRange(column));
        }

        let native = &record[TUBE_ID_SIZE..];
        let point = core.native.read_point(native);
        let pooled = core.pool.acquire(point, native);
        let tick = calc_tick(&point, &core.bounds, depth);
        place(column, pooled, tick)?;
    }
    Ok(())
}

/// A persisted storage unit covering the contiguous index range
/// `[id, id + max_points)` at one depth band.
///
/// The two layouts are a closed set chosen once at creation time: sparse
/// chunks appear where occupancy is expected to be low relative to capacity,
/// contiguous chunks where most columns will fill.
pub enum Chunk {
    Sparse(SparseChunk),
    Contiguous(ContiguousChunk),
}

impl Chunk {
    /// Build an empty chunk of the requested layout.
    pub fn create(
        ctx: &ChunkContext,
        depth: u64,
        id: TreeIndex,
        max_points: u64,
        contiguous: bool,
    ) -> Chunk {
        let core = ChunkCore::new(ctx, depth, id, max_points, 0);
        if contiguous {
            Chunk::Contiguous(ContiguousChunk::new(core))
        } else {
            Chunk::Sparse(SparseChunk::new(core))
        }
    }

    /// Reconstruct a chunk from a downloaded blob. The layout comes from the
    /// blob's own trailer, not from the caller.
    pub fn from_bytes(
        ctx: &ChunkContext,
        depth: u64,
        id: TreeIndex,
        max_points: u64,
        mut data: Vec<u8>,
    ) -> Result<Chunk> {
        let trailer = pop_trailer(&mut data)?;
        let core = ChunkCore::new(ctx, depth, id, max_points, trailer.num_points);
        match trailer.chunk_type {
            ChunkType::Sparse => Ok(Chunk::Sparse(SparseChunk::from_bytes(core, &data)?)),
            ChunkType::Contiguous => {
                Ok(Chunk::Contiguous(ContiguousChunk::from_bytes(core, &data)?))
            }
        }
    }

    /// GET the chunk's blob from `endpoint` and reconstruct it.
    pub fn load(
        ctx: &ChunkContext,
        endpoint: &dyn Endpoint,
        depth: u64,
        id: TreeIndex,
        max_points: u64,
    ) -> Result<Chunk> {
        let data = endpoint.get_subpath(&id.to_string())?;
        log::debug!("loaded chunk {} ({} bytes)", id, data.len());
        Self::from_bytes(ctx, depth, id, max_points, data)
    }

    /// The cell owning the climber's current position, created if absent.
    ///
    /// A call that creates the cell adds one native point size to the shared
    /// accounting and bumps this chunk's point count; repeat calls for an
    /// existing cell change nothing.
    pub fn get_cell(&self, climber: &Climber<'_>) -> CellGuard<'_> {
        match self {
            Chunk::Sparse(chunk) => chunk.get_cell(climber),
            Chunk::Contiguous(chunk) => chunk.get_cell(climber),
        }
    }

    /// Serialize, persist with retry, and release the resident points back
    /// to the pool. Consumes the chunk: nothing is usable after a save.
    pub fn save(self, endpoint: &dyn Endpoint) -> Result<()> {
        self.save_versioned(endpoint, "")
    }

    /// Like [`save`](Chunk::save), persisting to the chunk path plus
    /// `postfix` so a rebuild can land beside the original until promotion.
    pub fn save_versioned(self, endpoint: &dyn Endpoint, postfix: &str) -> Result<()> {
        match self {
            Chunk::Sparse(chunk) => chunk.save(endpoint, postfix),
            Chunk::Contiguous(chunk) => chunk.save(endpoint, postfix),
        }
    }

    pub fn chunk_type(&self) -> ChunkType {
        match self {
            Chunk::Sparse(_) => ChunkType::Sparse,
            Chunk::Contiguous(_) => ChunkType::Contiguous,
        }
    }

    pub fn id(&self) -> &TreeIndex {
        &self.core().id
    }

    pub fn depth(&self) -> u64 {
        self.core().depth
    }

    pub fn max_points(&self) -> u64 {
        self.core().max_points
    }

    /// Resident point count; an estimate maintained at cell creation.
    pub fn num_points(&self) -> u64 {
        self.core().num_points.load(Ordering::Relaxed)
    }

    /// Visit every occupied cell as (column, tick, point).
    pub fn for_each_point(&self, visit: impl FnMut(u64, u64, &Point)) {
        match self {
            Chunk::Sparse(chunk) => chunk.for_each_point(visit),
            Chunk::Contiguous(chunk) => chunk.for_each_point(visit),
        }
    }

    fn core(&self) -> &ChunkCore {
        match self {
            Chunk::Sparse(chunk) => chunk.core(),
            Chunk::Contiguous(chunk) => chunk.core(),
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
