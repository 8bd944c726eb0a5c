use super::{each_record, push_trailer, ChunkCore, ChunkType, Trailer};
use crate::climber::Climber;
use crate::compression::Compressor;
use crate::endpoint::{ensure_put, Endpoint};
use crate::error::{Error, Result};
use crate::tube::{CellGuard, Tube};

use treeline_core::Point;

use std::sync::atomic::Ordering;

/// Array-based chunk layout for densely populated depth bands.
///
/// Every possible column gets its tube up front. The array never changes
/// shape afterward, so cell access needs no chunk-level synchronization at
/// all: distinct columns are distinct tubes, and each tube synchronizes its
/// own cells.
pub struct ContiguousChunk {
    core: ChunkCore,
    tubes: Vec<Tube>,
}

impl ContiguousChunk {
    pub(crate) fn new(core: ChunkCore) -> Self {
        let tubes = (0..core.max_points).map(|_| Tube::default()).collect();
        Self { core, tubes }
    }

    pub(crate) fn from_bytes(core: ChunkCore, compressed: &[u8]) -> Result<Self> {
        let chunk = Self::new(core);
        each_record(&chunk.core, compressed, |column, point, tick| {
            if let Some(rejected) = chunk.tubes[column as usize].add_cell(tick, point) {
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

    pub fn get_cell(&self, climber: &Climber<'_>) -> CellGuard<'_> {
        let column = self.core.normalize(climber.index());
        let (added, cell) = self.tubes[column as usize].get_cell(climber.tick());
        if added {
            self.core.cell_added();
        }
        cell
    }

    pub(crate) fn save(self, endpoint: &dyn Endpoint, postfix: &str) -> Result<()> {
        let ContiguousChunk { core, tubes } = self;

        let mut compressor = Compressor::new();
        let mut buf = Vec::new();
        let mut stack = Vec::new();

        for (column, tube) in tubes.iter().enumerate() {
            tube.save(column as u64, &mut buf, &mut stack);
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
                chunk_type: ChunkType::Contiguous,
            },
        );

        let path = core.path(postfix);
        log::debug!(
            "saving contiguous chunk {} ({} bytes)",
            path,
            compressed.len()
        );
        ensure_put(endpoint, &path, &compressed);
        Ok(())
    }

    pub fn for_each_point(&self, mut visit: impl FnMut(u64, u64, &Point)) {
        for (column, tube) in self.tubes.iter().enumerate() {
            tube.for_each_point(|tick, point| visit(column as u64, tick, point));
        }
    }
}
