use crate::structure::Structure;
use crate::tube::calc_tick;

use treeline_core::{Bounds, Dir, Point, TreeIndex};

/// Traversal cursor over tree-index space.
///
/// A climber descends one level at a time, tracking which chunk owns the
/// current node and which vertical bucket ("tick") within that chunk's tube
/// owns the last magnified point. One climber is created per inserted point
/// and discarded after the descent; cloning one forks the descent.
///
/// This is the ingestion hot path -- one call per point per tree level -- so
/// a step performs no work beyond the index bookkeeping itself.
#[derive(Clone)]
pub struct Climber<'a> {
    structure: &'a Structure,
    dimensions: u32,
    factor: u64,
    index: TreeIndex,
    level_index: TreeIndex,
    chunk_id: TreeIndex,
    depth: u64,
    sparse_depth_begin: u64,
    depth_chunks: u64,
    chunk_num: u64,
    chunk_points: u64,
    tick: u64,
    /// Frame of reference for tick calculation; never shrinks.
    tree_bounds: Bounds,
    /// Current node's cell; shrinks with every step.
    bounds: Bounds,
}

impl<'a> Climber<'a> {
    pub fn new(bounds: Bounds, structure: &'a Structure) -> Self {
        Self {
            structure,
            dimensions: structure.dimensions(),
            factor: structure.factor(),
            index: TreeIndex::zero(),
            level_index: TreeIndex::zero(),
            chunk_id: structure.nominal_chunk_index().clone(),
            depth: 0,
            sparse_depth_begin: if structure.dynamic_chunks() {
                structure.sparse_depth_begin()
            } else {
                0
            },
            depth_chunks: 1,
            chunk_num: 0,
            chunk_points: structure.base_chunk_points(),
            tick: 0,
            tree_bounds: bounds,
            bounds,
        }
    }

    /// Advance one level toward the child cell containing `point`.
    pub fn magnify(&mut self, point: &Point) {
        let mid = self.bounds.mid();

        // Up: +4, down: +0 (3D only). North: +2, south: +0. East: +1.
        let up = self.dimensions == 3 && point.z >= mid.z;
        let north = point.y >= mid.y;
        let east = point.x >= mid.x;

        self.climb(Dir::from_bits(east, north, up));
        self.tick = calc_tick(point, &self.tree_bounds, self.depth);
    }

    /// Advance one level in the direction `dir`.
    pub fn climb(&mut self, dir: Dir) {
        self.depth += 1;

        if self.depth > self.structure.nominal_chunk_depth() {
            if self.sparse_depth_begin == 0 || self.depth <= self.sparse_depth_begin {
                // Chunked band: the parent's position within its chunk,
                // scaled by one child generation, picks the new chunk.
                let slice = self.chunk_points / self.factor;
                let chunk_ratio = (&self.index - &self.chunk_id).simple() / slice;
                assert!(chunk_ratio < self.factor, "chunk ratio out of range");

                self.chunk_id <<= self.dimensions;
                self.chunk_id.incr();
                self.chunk_id += chunk_ratio * self.chunk_points;

                if self.depth >= self.structure.cold_depth_begin() {
                    let offset = &self.chunk_id - self.structure.cold_index_begin();
                    self.chunk_num = offset.div_rem(self.chunk_points).0.simple();
                }

                self.depth_chunks *= self.factor;
            } else {
                // Sparse band: one chunk covers the whole level. The logical
                // capacity keeps growing so reconstruction sees a
                // depth-appropriate point count.
                self.chunk_num += self.depth_chunks;

                self.chunk_id <<= self.dimensions;
                self.chunk_id.incr();

                self.chunk_points *= self.factor;
            }
        }

        self.index <<= self.dimensions;
        self.index.incr();
        self.index += dir.offset();

        self.level_index <<= self.dimensions;
        self.level_index.incr();

        self.bounds.go(dir, self.dimensions == 3);
    }

    pub fn index(&self) -> &TreeIndex {
        &self.index
    }

    pub fn level_index(&self) -> &TreeIndex {
        &self.level_index
    }

    pub fn chunk_id(&self) -> &TreeIndex {
        &self.chunk_id
    }

    pub fn depth(&self) -> u64 {
        self.depth
    }

    /// Vertical bucket of the last magnified point.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Serial number of the owning chunk within the cold band.
    pub fn chunk_num(&self) -> u64 {
        self.chunk_num
    }

    /// Sibling chunks at the current depth band.
    pub fn depth_chunks(&self) -> u64 {
        self.depth_chunks
    }

    /// Point capacity of chunks at the current depth band.
    pub fn chunk_points(&self) -> u64 {
        self.chunk_points
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }
}

/// Depth-range, spatially-filtered enumeration over tree-index space.
///
/// Walks chunk-sized regions in fixed sibling order without touching any
/// in-memory tree links, skipping whole subtrees that cannot overlap the
/// query region. `next` yields `true` while a node at an emitted depth
/// overlaps the query and `false` once the traversal is exhausted; the
/// sequence is finite whenever a depth ceiling is configured.
pub struct SplitClimber<'a> {
    structure: &'a Structure,
    tree_bounds: Bounds,
    query_bounds: Bounds,
    depth_begin: u64,
    /// One past the deepest level to visit; 0 leaves the descent unbounded.
    depth_end: u64,
    /// Sibling ordinal at each level of the current path.
    traversal: Vec<u64>,
    /// Grid resolution per axis at the current depth.
    splits: u64,
    index: TreeIndex,
    x_pos: u64,
    y_pos: u64,
    z_pos: u64,
}

impl<'a> SplitClimber<'a> {
    pub fn new(
        structure: &'a Structure,
        tree_bounds: Bounds,
        query_bounds: Bounds,
        depth_begin: u64,
        depth_end: u64,
    ) -> Self {
        Self {
            structure,
            tree_bounds,
            query_bounds,
            depth_begin,
            depth_end,
            traversal: Vec::new(),
            splits: 1,
            index: TreeIndex::zero(),
            x_pos: 0,
            y_pos: 0,
            z_pos: 0,
        }
    }

    pub fn depth(&self) -> u64 {
        self.traversal.len() as u64
    }

    pub fn index(&self) -> &TreeIndex {
        &self.index
    }

    /// Advance to the next overlapping node; `false` when exhausted.
    pub fn next(&mut self) -> bool {
        self.step(false)
    }

    fn step(&mut self, terminate: bool) -> bool {
        let dimensions = self.structure.dimensions();

        if terminate || (self.depth_end != 0 && self.depth() + 1 == self.depth_end) {
            // Climb out of exhausted sibling ranges.
            while let Some(ordinal) = self.traversal.last_mut() {
                *ordinal += 1;
                if *ordinal < self.structure.factor() {
                    break;
                }
                self.traversal.pop();
                self.splits /= 2;

                // The node being popped is always the last sibling, so this
                // lands exactly on the parent.
                self.index >>= dimensions;
                self.index.decr();

                self.x_pos /= 2;
                self.y_pos /= 2;
                self.z_pos /= 2;
            }

            if let Some(&ordinal) = self.traversal.last() {
                self.index.incr();

                // Sibling-transition deltas of the fixed child order
                // (swd, sed, nwd, ned, swu, seu, nwu, neu).
                if ordinal % 2 == 1 {
                    self.x_pos += 1;
                }
                if ordinal == 2 || ordinal == 6 {
                    self.x_pos -= 1;
                    self.y_pos += 1;
                } else if ordinal == 4 {
                    self.x_pos -= 1;
                    self.y_pos -= 1;
                    self.z_pos += 1;
                }
            }
        } else {
            // Descend to the first child.
            self.traversal.push(0);
            self.splits *= 2;

            self.index <<= dimensions;
            self.index.incr();

            self.x_pos *= 2;
            self.y_pos *= 2;
            self.z_pos *= 2;
        }

        if self.traversal.is_empty() {
            return false;
        }
        if self.depth() < self.depth_begin {
            return self.step(false);
        }
        if self.overlaps() {
            true
        } else {
            // Skip the rest of this subtree before retrying.
            self.step(true)
        }
    }

    /// Whether the current grid cell overlaps the query region.
    fn overlaps(&self) -> bool {
        let tree_min = self.tree_bounds.min();
        let tree_max = self.tree_bounds.max();
        let splits = self.splits as f64;

        let dx = (tree_max.x - tree_min.x) / splits;
        let dy = (tree_max.y - tree_min.y) / splits;

        let (min_z, max_z) = if self.structure.is_3d() {
            let dz = (tree_max.z - tree_min.z) / splits;
            let min_z = tree_min.z + self.z_pos as f64 * dz;
            (min_z, min_z + dz)
        } else {
            (tree_min.z, tree_max.z)
        };

        let min = Point::new(
            tree_min.x + self.x_pos as f64 * dx,
            tree_min.y + self.y_pos as f64 * dy,
            min_z,
        );
        let max = Point::new(min.x + dx, min.y + dy, max_z);

        Bounds::new(min, max).overlaps(&self.query_bounds)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::StructureParams;

    fn octree_structure() -> Structure {
        Structure::new(StructureParams {
            dimensions: 3,
            base_chunk_points: 262_144, // 8^6
            sparse_depth_begin: 0,
            cold_depth_begin: 6,
            dynamic_chunks: true,
        })
    }

    fn cube() -> Bounds {
        Bounds::new(Point::new(0.0, 0.0, 0.0), Point::new(64.0, 64.0, 64.0))
    }

    #[test]
    fn nominal_descent_reaches_the_base_chunk() {
        let structure = octree_structure();
        let mut climber = Climber::new(cube(), &structure);
        let point = Point::new(1.0, 1.0, 1.0);

        for _ in 0..6 {
            climber.magnify(&point);
        }

        assert_eq!(climber.depth(), 6);
        assert_eq!(climber.chunk_id(), structure.nominal_chunk_index());
        assert_eq!(*climber.index(), TreeIndex::from(37_449));
        assert_eq!(climber.chunk_points(), 262_144);
        assert_eq!(climber.depth_chunks(), 1);
    }

    #[test]
    fn chunked_band_boundaries() {
        let structure = octree_structure();

        // All-southwest-down: the chunk boundary tracks the first chunk of
        // each band.
        let mut low = Climber::new(cube(), &structure);
        for _ in 0..7 {
            low.climb(Dir::Swd);
        }
        assert_eq!(*low.chunk_id(), TreeIndex::from(299_593));
        assert_eq!(*low.index(), TreeIndex::from(299_593));
        assert_eq!(low.depth_chunks(), 8);
        // The nominal chunk is serial 0; depth-7 chunks follow from 1.
        assert_eq!(low.chunk_num(), 1);

        // All-northeast-up: the last chunk of the band.
        let mut high = Climber::new(cube(), &structure);
        for _ in 0..7 {
            high.climb(Dir::Neu);
        }
        assert_eq!(*high.chunk_id(), TreeIndex::from(299_593 + 7 * 262_144));
        assert_eq!(*high.index(), TreeIndex::from(2_396_744));
        assert_eq!(high.chunk_num(), 8);

        // The node always falls inside its own chunk's range.
        let offset = high.index() - high.chunk_id();
        assert!(offset.simple() < high.chunk_points());
    }

    #[test]
    fn magnify_and_climb_agree() {
        let structure = octree_structure();
        let point = Point::new(33.0, 12.0, 55.0);

        let mut magnified = Climber::new(cube(), &structure);
        let mut directed = Climber::new(cube(), &structure);

        for _ in 0..8 {
            let mid = directed.bounds().mid();
            let dir = Dir::from_bits(point.x >= mid.x, point.y >= mid.y, point.z >= mid.z);
            magnified.magnify(&point);
            directed.climb(dir);

            assert_eq!(magnified.index(), directed.index());
            assert_eq!(magnified.chunk_id(), directed.chunk_id());
            assert_eq!(magnified.depth(), directed.depth());
        }

        // Repeated runs are deterministic.
        let mut again = Climber::new(cube(), &structure);
        for _ in 0..8 {
            again.magnify(&point);
        }
        assert_eq!(again.index(), magnified.index());
        assert_eq!(again.tick(), magnified.tick());
    }

    #[test]
    fn sparse_band_shares_one_chunk_per_level() {
        let structure = Structure::new(StructureParams {
            dimensions: 3,
            base_chunk_points: 512, // 8^3
            sparse_depth_begin: 4,
            cold_depth_begin: 3,
            dynamic_chunks: true,
        });

        let mut climber = Climber::new(cube(), &structure);
        for _ in 0..4 {
            climber.climb(Dir::Swd);
        }
        let depth_chunks = climber.depth_chunks();
        let chunk_num = climber.chunk_num();
        assert_eq!(depth_chunks, 8);
        assert_eq!(climber.chunk_points(), 512);

        // Past the sparse threshold: capacity grows, boundary count does not.
        climber.climb(Dir::Swd);
        assert_eq!(climber.depth_chunks(), depth_chunks);
        assert_eq!(climber.chunk_points(), 512 * 8);
        assert_eq!(climber.chunk_num(), chunk_num + depth_chunks);

        climber.climb(Dir::Swd);
        assert_eq!(climber.chunk_points(), 512 * 64);
        assert_eq!(climber.chunk_num(), chunk_num + 2 * depth_chunks);
    }

    #[test]
    fn forked_descents_diverge_independently() {
        let structure = octree_structure();
        let mut climber = Climber::new(cube(), &structure);
        for _ in 0..3 {
            climber.climb(Dir::Ned);
        }

        let mut fork = climber.clone();
        climber.climb(Dir::Swd);
        fork.climb(Dir::Neu);

        assert_ne!(climber.index(), fork.index());
        assert_eq!(climber.depth(), fork.depth());
    }

    fn quadtree_structure() -> Structure {
        Structure::new(StructureParams {
            dimensions: 2,
            base_chunk_points: 16, // 4^2
            sparse_depth_begin: 0,
            cold_depth_begin: 2,
            dynamic_chunks: true,
        })
    }

    fn flat(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Bounds {
        Bounds::new(Point::new(min_x, min_y, 0.0), Point::new(max_x, max_y, 0.0))
    }

    #[test]
    fn split_climber_visits_every_node_for_a_full_query() {
        let structure = quadtree_structure();
        let tree = flat(0.0, 0.0, 100.0, 100.0);
        let mut splitter = SplitClimber::new(&structure, tree, tree, 1, 3);

        let mut seen = Vec::new();
        while splitter.next() {
            seen.push((splitter.depth(), splitter.index().simple()));
        }

        // Depth 1 holds indices 1..=4, depth 2 holds 5..=20; each exactly once.
        let mut expected: Vec<(u64, u64)> = (1..=4).map(|i| (1, i)).collect();
        expected.extend((5..=20).map(|i| (2, i)));
        let mut sorted = seen.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, expected);
        assert_eq!(seen.len(), 20);

        // Exhausted for good.
        assert!(!splitter.next());
    }

    #[test]
    fn split_climber_prunes_subtrees_outside_the_query() {
        let structure = quadtree_structure();
        let tree = flat(0.0, 0.0, 100.0, 100.0);
        // Strictly inside the southwest quadrant.
        let query = flat(10.0, 10.0, 20.0, 20.0);
        let mut splitter = SplitClimber::new(&structure, tree, query, 1, 3);

        let mut seen = Vec::new();
        while splitter.next() {
            seen.push((splitter.depth(), splitter.index().simple()));
        }

        // Southwest node at depth 1 and its southwest child at depth 2.
        assert_eq!(seen, vec![(1, 1), (2, 5)]);
    }

    #[test]
    fn split_climber_skips_depths_below_begin() {
        let structure = quadtree_structure();
        let tree = flat(0.0, 0.0, 100.0, 100.0);
        let mut splitter = SplitClimber::new(&structure, tree, tree, 2, 3);

        let mut count = 0;
        while splitter.next() {
            assert_eq!(splitter.depth(), 2);
            count += 1;
        }
        assert_eq!(count, 16);
    }

    #[test]
    fn split_climber_octree_grid_tracks_the_index() {
        let structure = octree_structure();
        let tree = Bounds::new(Point::new(0.0, 0.0, 0.0), Point::new(8.0, 8.0, 8.0));
        // Upper octant only.
        let query = Bounds::new(Point::new(0.1, 0.1, 6.1), Point::new(1.9, 1.9, 7.9));
        let mut splitter = SplitClimber::new(&structure, tree, query, 1, 3);

        let mut seen = Vec::new();
        while splitter.next() {
            seen.push((splitter.depth(), splitter.index().simple()));
        }

        // Depth 1: swu (index 5). Depth 2: its swu child.
        // Children of 5 are 41..=48; swu is ordinal 4 -> 45.
        assert_eq!(seen, vec![(1, 5), (2, 45)]);
    }
}
