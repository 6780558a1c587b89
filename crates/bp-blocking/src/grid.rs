//! Decomposition of a bounded 5-D index space into a regular, halo-free
//! grid of blocks (`spec.md` §4.1). Pure coordinate math: no I/O.

use bp_types::{Coord5, Dim, PipelineError, NDIM};
use serde::{Deserialize, Serialize};

/// Opaque grid-local block identifier. Re-exported from `bp_types` so the
/// rest of the pipeline can talk about blocks without depending on the grid.
pub use bp_types::BlockId;

/// `(id, begin, end, shape)` for one block (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub id: BlockId,
    pub begin: Coord5,
    pub end: Coord5,
}

impl BlockRef {
    pub fn shape(&self) -> Coord5 {
        let mut out = [0u64; NDIM];
        for i in 0..NDIM {
            out[i] = self.end[i] - self.begin[i];
        }
        out
    }
}

/// A regular tiling of `[0, shape)` by a fixed per-axis block shape.
///
/// Invariants enforced at construction: `block_shape[0] == 1` (per time
/// frame), `block_shape[4] == 1` (per channel), and `block_shape[3] == 1`
/// when `dim == Dim::Two`. Edge blocks are truncated to `shape`, never
/// padded.
#[derive(Debug, Clone)]
pub struct BlockGrid {
    shape: Coord5,
    block_shape: Coord5,
    dim: Dim,
    /// Number of blocks along each axis, i.e. `ceil(shape[i] / block_shape[i])`.
    counts: Coord5,
}

impl BlockGrid {
    pub fn new(shape: Coord5, block_shape: Coord5, dim: Dim) -> Result<Self, PipelineError> {
        if block_shape[0] != 1 {
            return Err(PipelineError::Validation(
                "block_shape[0] (t) must be 1".into(),
            ));
        }
        if block_shape[4] != 1 {
            return Err(PipelineError::Validation(
                "block_shape[4] (c) must be 1".into(),
            ));
        }
        if dim == Dim::Two && block_shape[3] != 1 {
            return Err(PipelineError::Validation(
                "block_shape[3] (z) must be 1 for 2-D volumes".into(),
            ));
        }
        for i in 0..NDIM {
            if block_shape[i] == 0 {
                return Err(PipelineError::Validation(format!(
                    "block_shape[{i}] must be positive"
                )));
            }
            if shape[i] == 0 {
                return Err(PipelineError::Validation(format!("shape[{i}] must be positive")));
            }
        }

        let mut counts = [0u64; NDIM];
        for i in 0..NDIM {
            counts[i] = shape[i].div_ceil(block_shape[i]);
        }

        Ok(Self {
            shape,
            block_shape,
            dim,
            counts,
        })
    }

    pub fn shape(&self) -> Coord5 {
        self.shape
    }

    pub fn block_shape(&self) -> Coord5 {
        self.block_shape
    }

    pub fn dim(&self) -> Dim {
        self.dim
    }

    pub fn total_blocks(&self) -> u64 {
        self.counts.iter().product()
    }

    /// Grid-local index of `point` along every axis, clamped to the last
    /// block when `point[i]` sits exactly on the upper bound (§4.1: "for
    /// coordinates equal to an axis upper bound, the block to the left is
    /// returned").
    fn grid_coord_of(&self, point: &Coord5) -> Coord5 {
        let mut out = [0u64; NDIM];
        for i in 0..NDIM {
            let idx = point[i] / self.block_shape[i];
            out[i] = idx.min(self.counts[i] - 1);
        }
        out
    }

    fn id_of_grid_coord(&self, gc: &Coord5) -> BlockId {
        let mut id: u64 = 0;
        for i in 0..NDIM {
            id = id * self.counts[i] + gc[i];
        }
        BlockId(id)
    }

    fn grid_coord_of_id(&self, id: BlockId) -> Coord5 {
        let mut rem = id.0;
        let mut gc = [0u64; NDIM];
        for i in (0..NDIM).rev() {
            gc[i] = rem % self.counts[i];
            rem /= self.counts[i];
        }
        gc
    }

    fn block_ref_of_grid_coord(&self, gc: Coord5) -> BlockRef {
        let mut begin = [0u64; NDIM];
        let mut end = [0u64; NDIM];
        for i in 0..NDIM {
            begin[i] = gc[i] * self.block_shape[i];
            end[i] = (begin[i] + self.block_shape[i]).min(self.shape[i]);
        }
        BlockRef {
            id: self.id_of_grid_coord(&gc),
            begin,
            end,
        }
    }

    /// The unique block containing `coord` (§4.1 `block_at`).
    pub fn block_at(&self, coord: &Coord5) -> BlockId {
        self.id_of_grid_coord(&self.grid_coord_of(coord))
    }

    /// Resolve a block by id (§4.1 `block`).
    pub fn block(&self, id: BlockId) -> Result<BlockRef, PipelineError> {
        if id.0 >= self.total_blocks() {
            return Err(PipelineError::Validation(format!(
                "block id {} out of range (grid has {} blocks)",
                id.0,
                self.total_blocks()
            )));
        }
        Ok(self.block_ref_of_grid_coord(self.grid_coord_of_id(id)))
    }

    /// All blocks, in canonical lexicographic order (§4.1 `enumerate`).
    pub fn enumerate(&self) -> Vec<BlockRef> {
        (0..self.total_blocks())
            .map(|i| self.block_ref_of_grid_coord(self.grid_coord_of_id(BlockId(i))))
            .collect()
    }

    /// Every block id intersecting `[begin, end)`, built from the Cartesian
    /// product of the per-axis ranges derived from `block_at(begin)` and
    /// `block_at(end - 1)` (§4.1 `blocks_in`).
    pub fn blocks_in(&self, begin: &Coord5, end: &Coord5) -> Result<Vec<BlockId>, PipelineError> {
        let mut inclusive_end = [0u64; NDIM];
        for i in 0..NDIM {
            if end[i] == 0 {
                return Err(PipelineError::Validation(format!("end[{i}] must be > 0")));
            }
            inclusive_end[i] = end[i] - 1;
        }

        let gbegin = self.grid_coord_of(begin);
        let gend = self.grid_coord_of(&inclusive_end);

        let mut ranges: Vec<Vec<u64>> = Vec::with_capacity(NDIM);
        for i in 0..NDIM {
            let (lo, hi) = if gbegin[i] <= gend[i] {
                (gbegin[i], gend[i])
            } else {
                (gend[i], gbegin[i])
            };
            ranges.push((lo..=hi).collect());
        }

        let mut ids = Vec::new();
        cartesian_product(&ranges, &mut [0u64; NDIM], 0, &mut |gc| {
            ids.push(self.id_of_grid_coord(gc));
        });
        Ok(ids)
    }
}

fn cartesian_product(ranges: &[Vec<u64>], acc: &mut Coord5, axis: usize, f: &mut impl FnMut(&Coord5)) {
    if axis == ranges.len() {
        f(acc);
        return;
    }
    for &v in &ranges[axis] {
        acc[axis] = v;
        cartesian_product(ranges, acc, axis + 1, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> BlockGrid {
        BlockGrid::new([1, 16, 16, 1, 2], [1, 8, 8, 1, 1], Dim::Two).unwrap()
    }

    #[test]
    fn rejects_non_unit_time_block() {
        assert!(BlockGrid::new([1, 16, 16, 1, 2], [2, 8, 8, 1, 1], Dim::Two).is_err());
    }

    #[test]
    fn rejects_non_unit_z_block_in_2d() {
        assert!(BlockGrid::new([1, 16, 16, 2, 2], [1, 8, 8, 2, 1], Dim::Two).is_err());
    }

    #[test]
    fn enumerate_is_total_and_bijective_with_block_at() {
        let g = grid();
        let refs = g.enumerate();
        assert_eq!(refs.len() as u64, g.total_blocks());
        for r in &refs {
            // every point in the block maps back to the same id
            assert_eq!(g.block_at(&r.begin), r.id);
            let mut last = r.end;
            for i in 0..NDIM {
                if last[i] > 0 {
                    last[i] -= 1;
                }
            }
            assert_eq!(g.block_at(&last), r.id);
        }
    }

    #[test]
    fn grid_partition_covers_every_point() {
        let g = grid();
        for x in 0..16u64 {
            for y in 0..16u64 {
                let id = g.block_at(&[0, x, y, 0, 0]);
                let b = g.block(id).unwrap();
                assert!(b.begin[1] <= x && x < b.end[1]);
                assert!(b.begin[2] <= y && y < b.end[2]);
            }
        }
    }

    #[test]
    fn upper_bound_query_returns_left_block() {
        let g = grid();
        // the axis upper bound (16) must map to the rightmost block, not panic/overflow
        let id = g.block_at(&[0, 16, 16, 0, 0]);
        let b = g.block(id).unwrap();
        assert_eq!(b.end[1], 16);
        assert_eq!(b.end[2], 16);
    }

    #[test]
    fn blocks_in_covers_the_requested_roi() {
        let g = grid();
        let ids = g.blocks_in(&[0, 0, 0, 0, 0], &[1, 16, 16, 1, 2]).unwrap();
        assert_eq!(ids.len(), 4, "2x2 grid of 8x8 blocks over a 16x16 volume");
    }

    #[test]
    fn blocks_in_single_block_roi_returns_one_id() {
        let g = grid();
        let ids = g.blocks_in(&[0, 0, 0, 0, 0], &[1, 4, 4, 1, 2]).unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn edge_blocks_are_truncated_not_padded() {
        let g = BlockGrid::new([1, 10, 10, 1, 1], [1, 8, 8, 1, 1], Dim::Two).unwrap();
        let refs = g.enumerate();
        assert!(refs.iter().any(|r| r.shape()[1] == 2 || r.shape()[2] == 2));
        for r in &refs {
            assert!(r.end[1] <= 10 && r.end[2] <= 10);
        }
    }

    #[test]
    fn dim2_degenerate_z_axis() {
        let g = grid();
        for r in g.enumerate() {
            assert_eq!(r.end[3] - r.begin[3], 1);
        }
    }
}
