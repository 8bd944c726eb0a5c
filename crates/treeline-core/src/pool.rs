use crate::geometry::Point;

use parking_lot::Mutex;

/// A pooled point: the parsed coordinates plus the raw native record bytes.
struct PointEntry {
    point: Point,
    data: Vec<u8>,
}

/// Owned handle to one resident point.
///
/// Handles are move-only on purpose: a handle that has been released back to
/// the pool no longer exists, so use-after-release is unrepresentable.
pub struct PooledPoint {
    entry: Box<PointEntry>,
}

impl PooledPoint {
    pub fn point(&self) -> &Point {
        &self.entry.point
    }

    /// The raw native record bytes, exactly as acquired.
    pub fn data(&self) -> &[u8] {
        &self.entry.data
    }
}

/// Shared arena for resident point memory.
///
/// `acquire` copies a native record into a recycled entry; `release` takes a
/// drained batch back after the records have been flushed into a serialized
/// buffer. Entries keep their byte buffers across recycles, so a steady-state
/// writer stops allocating once the pool is warm.
#[derive(Default)]
pub struct PointPool {
    free: Mutex<Vec<Box<PointEntry>>>,
}

impl PointPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a copy of `record`.
    pub fn acquire(&self, point: Point, record: &[u8]) -> PooledPoint {
        let mut entry = self.free.lock().pop().unwrap_or_else(|| {
            Box::new(PointEntry {
                point: Point::default(),
                data: Vec::new(),
            })
        });
        entry.point = point;
        entry.data.clear();
        entry.data.extend_from_slice(record);
        PooledPoint { entry }
    }

    /// Return a drained batch of handles to the pool.
    pub fn release(&self, stack: Vec<PooledPoint>) {
        let mut free = self.free.lock();
        free.extend(stack.into_iter().map(|pooled| pooled.entry));
    }

    /// Number of idle entries available for recycling.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn acquire_copies_and_release_recycles() {
        let pool = PointPool::new();
        let record = [7u8; 24];

        let a = pool.acquire(Point::new(1.0, 2.0, 3.0), &record);
        assert_eq!(a.data(), &record);
        assert_eq!(a.point().x, 1.0);
        assert_eq!(pool.idle(), 0);

        pool.release(vec![a]);
        assert_eq!(pool.idle(), 1);

        let b = pool.acquire(Point::new(4.0, 5.0, 6.0), &[1, 2, 3]);
        assert_eq!(pool.idle(), 0);
        assert_eq!(b.data(), &[1, 2, 3]);
        assert_eq!(b.point().y, 5.0);
    }
}
