use super::{each_record, push_trailer, ChunkCore, ChunkType, Trailer};
use crate::climber::Climber;
use crate::compression::Compressor;
use crate::endpoint::{ensure_put, Endpoint};
use crate::error::{Error, Result};
use crate::tube::{CellGuard, Tube};

use parking_lot::Mutex;
use treeline_core::Point;

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

/// Map-based chunk layout for depth bands where most columns stay empty.
///
/// Tubes materialize the first time their column receives a point. The
/// column map's lock is held only for the lookup-or-insert; the returned
/// tube synchronizes its own cells, so writers on different columns only
/// ever contend for the brief map access.
pub struct SparseChunk {
    core: ChunkCore,
    tubes: Mutex<BTreeMap<u64, Box<Tube>>>,
}

impl SparseChunk {
    pub(crate) fn new(core: ChunkCore) -> Self {
        Self {
            core,
            tubes: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn from_bytes(core: ChunkCore, compressed: &[u8]) -> Result<Self> {
        let chunk = Self::new(core);
        each_record(&chunk.core, compressed, |column, point, tick| {
            if let Some(rejected) = chunk.tube(column).add_cell(tick, point) {
                chunk.core.pool.release(vec![rejected]);
                return Err(Error::PointCollision { column, tick });
            }
            Ok(())
        })?;
        Ok(chunk)
    }

    pub(crate) fn core(&self) -> &ChunkCore {
        &self.core
    }

    /// Fetch or create the tube for a normalized column index.
    fn tube(&self, column: u64) -> &Tube {
        debug_assert!(column < self.core.max_points);
        let mut tubes = self.tubes.lock();
        let tube: *const Tube = &**tubes.entry(column).or_default();
        drop(tubes);
        // SAFETY: tubes are inserted but never removed or replaced while the
        // chunk is alive, and the box keeps each tube at a stable address,
        // so the reference remains valid for as long as `self` is borrowed.
        unsafe { &*tube }
    }

    pub fn get_cell(&self, climber: &Climber<'_>) -> CellGuard<'_> {
        let column = self.core.normalize(climber.index());
        let (added, cell) = self.tube(column).get_cell(climber.tick());
        if added {
            self.core.cell_added();
        }
        cell
    }

    pub(crate) fn save(self, endpoint: &dyn Endpoint, postfix: &str) -> Result<()> {
        let SparseChunk { core, tubes } = self;
        let tubes = tubes.into_inner();

        let mut compressor = Compressor::new();
        let mut buf = Vec::new();
        let mut stack = Vec::new();

        for (&column, tube) in tubes.iter() {
            tube.save(column, &mut buf, &mut stack);
            if !buf.is_empty() {
                compressor.push(&buf)?;
                buf.clear();
            }
        }

        let mut compressed = compressor.finish()?;
        core.pool.release(stack);
        push_trailer(
            &mut compressed,
            Trailer {
                num_points: core.num_points.load(Ordering::Relaxed),
                chunk_type: ChunkType::Sparse,
            },
        );

        let path = core.path(postfix);
        log::debug!("saving sparse chunk {} ({} bytes)", path, compressed.len());
        ensure_put(endpoint, &path, &compressed);
        Ok(())
    }

    pub fn for_each_point(&self, mut visit: impl FnMut(u64, u64, &Point)) {
        let tubes = self.tubes.lock();
        for (&column, tube) in tubes.iter() {
            tube.for_each_point(|tick, point| visit(column, tick, point));
        }
    }
}
