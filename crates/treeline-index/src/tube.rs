use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use treeline_core::{Bounds, Point, PooledPoint};

use std::collections::BTreeMap;

/// One point-storage slot within a tube.
///
/// A cell holds at most one resident point; what happens to a second point
/// that lands on the same tick is an insertion-policy decision made above
/// this layer, so `store` hands the colliding point back instead of deciding.
#[derive(Default)]
pub struct Cell {
    point: Option<PooledPoint>,
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        self.point.is_none()
    }

    pub fn point(&self) -> Option<&PooledPoint> {
        self.point.as_ref()
    }

    /// Occupy the cell, or return the incoming handle untouched if the cell
    /// already holds a point.
    pub fn store(&mut self, point: PooledPoint) -> Option<PooledPoint> {
        if self.point.is_none() {
            self.point = Some(point);
            None
        } else {
            Some(point)
        }
    }

    pub fn take(&mut self) -> Option<PooledPoint> {
        self.point.take()
    }
}

/// Write access to one cell, held under its tube's lock.
pub type CellGuard<'a> = MappedMutexGuard<'a, Cell>;

/// Per-column point storage: one cell per vertical bucket.
///
/// Cells live in tick order so serialization walks them in a stable order.
/// The map sits behind its own mutex, which makes concurrent access to
/// different ticks of one column safe as well; the lock is held only for the
/// lookup-or-insert and while a returned [`CellGuard`] is alive.
#[derive(Default)]
pub struct Tube {
    cells: Mutex<BTreeMap<u64, Cell>>,
}

impl Tube {
    /// Fetch or create the cell for `tick`. The flag reports whether the
    /// slot was newly created by this call.
    pub fn get_cell(&self, tick: u64) -> (bool, CellGuard<'_>) {
        let mut added = false;
        let guard = MutexGuard::map(self.cells.lock(), |cells| {
            cells.entry(tick).or_insert_with(|| {
                added = true;
                Cell::default()
            })
        });
        (added, guard)
    }

    /// Reconstruction path: place `point` at `tick`, returning it on
    /// collision.
    pub fn add_cell(&self, tick: u64, point: PooledPoint) -> Option<PooledPoint> {
        let (_, mut cell) = self.get_cell(tick);
        cell.store(point)
    }

    /// Number of cells, occupied or not.
    pub fn num_cells(&self) -> usize {
        self.cells.lock().len()
    }

    /// Drain every occupied cell, in tick order, into `buf` as celled wire
    /// records, pushing the drained handles onto `stack` for release once
    /// the buffer has been flushed through the compressor.
    pub fn save(&self, column: u64, buf: &mut Vec<u8>, stack: &mut Vec<PooledPoint>) {
        let mut cells = self.cells.lock();
        for cell in cells.values_mut() {
            if let Some(point) = cell.take() {
                buf.extend_from_slice(&column.to_le_bytes());
                buf.extend_from_slice(point.data());
                stack.push(point);
            }
        }
    }

    /// Visit every occupied cell in tick order.
    pub fn for_each_point(&self, mut visit: impl FnMut(u64, &Point)) {
        let cells = self.cells.lock();
        for (&tick, cell) in cells.iter() {
            if let Some(point) = cell.point() {
                visit(tick, point.point());
            }
        }
    }
}

/// Vertical bucket of `point` at `depth`: the bounds' z-span is cut into
/// `2^depth` slices, so deeper levels separate points that share a column
/// ever more finely. Degenerate spans (2D mode) always bucket to zero.
/// Stable and deterministic for identical inputs.
pub fn calc_tick(point: &Point, bounds: &Bounds, depth: u64) -> u64 {
    let span = bounds.height();
    if span <= 0.0 {
        return 0;
    }
    let slices = 1u64 << depth.min(63) as u32;
    let fraction = ((point.z - bounds.min().z) / span).clamp(0.0, 1.0);
    ((fraction * slices as f64) as u64).min(slices - 1)
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
