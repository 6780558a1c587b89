//! Blocking algebra: the 5-D grid index <-> coordinate conversions that the
//! rest of the pipeline uses to identify, locate, and stitch blocks.

pub mod grid;

pub use grid::{BlockGrid, BlockRef};
pub use bp_types::BlockId;
