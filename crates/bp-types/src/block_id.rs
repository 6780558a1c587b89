//! The block identifier shared by every component that talks about a
//! block without needing the grid math itself (cache, bus, collector).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lexicographic enumeration index of a block within its grid (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BlockId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(BlockId(s.parse()?))
    }
}

pub fn cache_block_key(id: BlockId) -> String {
    format!("prediction-{}-block", id.0)
}

pub fn cache_shape_key(id: BlockId) -> String {
    format!("prediction-{}-shape", id.0)
}
