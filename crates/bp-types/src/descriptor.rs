//! Cache sidecar descriptor encoding: `"64_64_64_3_float32"`, or the
//! reserved placeholder value `"dummy"`.

use crate::coord::{Coord5, Dtype};
use serde::{Deserialize, Serialize};

pub const DUMMY_DESCRIPTOR: &str = "dummy";

/// A decoded cache descriptor: either an in-flight placeholder, or the
/// shape/dtype of a resident payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockDescriptor {
    Placeholder,
    Payload { shape: Coord5, dtype: Dtype },
}

impl BlockDescriptor {
    pub fn encode(&self) -> String {
        match self {
            BlockDescriptor::Placeholder => DUMMY_DESCRIPTOR.to_string(),
            BlockDescriptor::Payload { shape, dtype } => {
                format!("{}_{}", crate::coord::format_underscore_coord(shape), dtype.tag())
            }
        }
    }

    /// Malformed descriptors are treated as absent by the caller (§4.2), not
    /// as an error here: this returns `None` rather than a `Result`.
    pub fn decode(s: &str) -> Option<Self> {
        if s == DUMMY_DESCRIPTOR {
            return Some(BlockDescriptor::Placeholder);
        }
        let mut parts: Vec<&str> = s.split('_').collect();
        if parts.len() != 6 {
            return None;
        }
        let dtype_tag = parts.pop()?;
        let dtype = Dtype::parse(dtype_tag)?;
        let mut shape = [0u64; 5];
        for (i, p) in parts.iter().enumerate() {
            shape[i] = p.parse().ok()?;
        }
        Some(BlockDescriptor::Payload { shape, dtype })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips() {
        let d = BlockDescriptor::Payload {
            shape: [1, 64, 64, 1, 3],
            dtype: Dtype::F32,
        };
        let s = d.encode();
        assert_eq!(s, "1_64_64_1_3_float32");
        assert_eq!(BlockDescriptor::decode(&s), Some(d));
    }

    #[test]
    fn dummy_round_trips() {
        assert_eq!(BlockDescriptor::Placeholder.encode(), "dummy");
        assert_eq!(BlockDescriptor::decode("dummy"), Some(BlockDescriptor::Placeholder));
    }

    #[test]
    fn malformed_descriptor_decodes_to_none() {
        assert_eq!(BlockDescriptor::decode("not-a-descriptor"), None);
        assert_eq!(BlockDescriptor::decode("1_2_3_float99"), None);
    }
}
