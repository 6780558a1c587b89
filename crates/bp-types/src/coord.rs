//! Canonical 5-D coordinate algebra: `(t, x, y, z, c)`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of axes in the canonical coordinate system.
pub const NDIM: usize = 5;

/// A point or shape in the canonical `(t, x, y, z, c)` order.
pub type Coord5 = [u64; NDIM];

/// Spatial dimensionality of a volume: the `z` axis collapses to size 1 when `d == 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dim {
    Two,
    Three,
}

impl Dim {
    pub fn spatial_axes(self) -> &'static [usize] {
        match self {
            Dim::Two => &[1, 2],
            Dim::Three => &[1, 2, 3],
        }
    }
}

/// Element type of a densely packed volume buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dtype {
    U8,
    U16,
    F32,
    /// Not one of the three raw element types in §3; reserved for the
    /// thresholder's connected-component label image (§4.7), which is a
    /// derived artifact rather than a raw voxel volume.
    U32,
}

impl Dtype {
    pub fn size_bytes(self) -> usize {
        match self {
            Dtype::U8 => 1,
            Dtype::U16 => 2,
            Dtype::F32 => 4,
            Dtype::U32 => 4,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Dtype::U8 => "uint8",
            Dtype::U16 => "uint16",
            Dtype::F32 => "float32",
            Dtype::U32 => "uint32",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "uint8" => Some(Dtype::U8),
            "uint16" => Some(Dtype::U16),
            "float32" => Some(Dtype::F32),
            "uint32" => Some(Dtype::U32),
            _ => None,
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A region of interest: exclusive-upper-bound box over the canonical axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub begin: Coord5,
    pub end: Coord5,
}

impl Roi {
    pub fn new(begin: Coord5, end: Coord5) -> Result<Self, crate::error::PipelineError> {
        for i in 0..NDIM {
            if begin[i] >= end[i] {
                return Err(crate::error::PipelineError::Validation(format!(
                    "axis {i}: begin ({}) must be < end ({})",
                    begin[i], end[i]
                )));
            }
        }
        Ok(Self { begin, end })
    }

    /// `end - begin`, per axis.
    pub fn shape(&self) -> Coord5 {
        let mut out = [0u64; NDIM];
        for i in 0..NDIM {
            out[i] = self.end[i] - self.begin[i];
        }
        out
    }

    /// True if `self` requires exactly one time frame (`labelimage` contract).
    pub fn is_single_frame(&self) -> bool {
        self.end[0] - self.begin[0] == 1
    }
}

/// Parse the `extents_min`/`extents_max` query format: `t_x_y_z_c` underscore-joined.
pub fn parse_underscore_coord(s: &str) -> Result<Coord5, crate::error::PipelineError> {
    let parts: Vec<&str> = s.split('_').collect();
    if parts.len() != NDIM {
        return Err(crate::error::PipelineError::Validation(format!(
            "expected {NDIM} underscore-joined components, got {}",
            parts.len()
        )));
    }
    let mut out = [0u64; NDIM];
    for (i, p) in parts.iter().enumerate() {
        out[i] = p.parse().map_err(|_| {
            crate::error::PipelineError::Validation(format!("component {i} ({p}) is not a non-negative integer"))
        })?;
    }
    Ok(out)
}

pub fn format_underscore_coord(c: &Coord5) -> String {
    c.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roi_rejects_reversed_extents() {
        let r = Roi::new([0, 0, 0, 0, 0], [1, 0, 1, 1, 1]);
        assert!(r.is_err());
    }

    #[test]
    fn roi_shape_is_end_minus_begin() {
        let r = Roi::new([0, 0, 0, 0, 0], [1, 16, 16, 1, 2]).unwrap();
        assert_eq!(r.shape(), [1, 16, 16, 1, 2]);
    }

    #[test]
    fn underscore_coord_round_trips() {
        let c: Coord5 = [1, 2, 3, 4, 5];
        let s = format_underscore_coord(&c);
        assert_eq!(s, "1_2_3_4_5");
        assert_eq!(parse_underscore_coord(&s).unwrap(), c);
    }

    #[test]
    fn underscore_coord_rejects_wrong_arity() {
        assert!(parse_underscore_coord("1_2_3").is_err());
    }
}
