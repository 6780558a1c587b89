//! Stitches the per-block payloads the completion collector gathered into
//! one dense buffer for the requested ROI, cropping to its exact extent.
//! Channel-dimension mismatches between a block's own declared shape and
//! the requested ROI are not treated as errors (spec non-goal): only the
//! overlapping channel range is copied.

use bp_types::{Coord5, Roi};

pub struct StitchBlock {
    /// The block's own absolute coordinates, time/spatial axes only.
    pub begin: Coord5,
    pub end: Coord5,
    pub payload: Vec<u8>,
    /// Declared shape from the block's `BlockDescriptor::Payload`.
    pub payload_shape: Coord5,
}

fn strides(shape: [u64; 4], channels: u64) -> [u64; 5] {
    [
        shape[1] * shape[2] * shape[3] * channels,
        shape[2] * shape[3] * channels,
        shape[3] * channels,
        channels,
        1,
    ]
}

/// Allocates an `elem_size`-byte-per-element buffer shaped like `roi` and
/// copies each block's overlap into it.
pub fn stitch_and_crop(blocks: &[StitchBlock], roi: &Roi, elem_size: usize) -> Vec<u8> {
    let out_shape = roi.shape();
    let out_channels = out_shape[4];
    let out_stride = strides([out_shape[0], out_shape[1], out_shape[2], out_shape[3]], out_channels);
    let out_elems = (out_shape[0] * out_shape[1] * out_shape[2] * out_shape[3] * out_channels) as usize;
    let mut out = vec![0u8; out_elems * elem_size];

    for block in blocks {
        let mut ov_begin = [0u64; 4];
        let mut ov_end = [0u64; 4];
        let mut empty = false;
        for i in 0..4 {
            ov_begin[i] = block.begin[i].max(roi.begin[i]);
            ov_end[i] = block.end[i].min(roi.end[i]);
            if ov_begin[i] >= ov_end[i] {
                empty = true;
            }
        }
        if empty {
            continue;
        }

        let payload_channels = block.payload_shape[4];
        let nc = payload_channels.min(out_channels);
        let payload_stride = strides(
            [
                block.payload_shape[0],
                block.payload_shape[1],
                block.payload_shape[2],
                block.payload_shape[3],
            ],
            payload_channels,
        );

        for t in ov_begin[0]..ov_end[0] {
            for x in ov_begin[1]..ov_end[1] {
                for y in ov_begin[2]..ov_end[2] {
                    for z in ov_begin[3]..ov_end[3] {
                        let p_base = (t - block.begin[0]) * payload_stride[0]
                            + (x - block.begin[1]) * payload_stride[1]
                            + (y - block.begin[2]) * payload_stride[2]
                            + (z - block.begin[3]) * payload_stride[3];
                        let o_base = (t - roi.begin[0]) * out_stride[0]
                            + (x - roi.begin[1]) * out_stride[1]
                            + (y - roi.begin[2]) * out_stride[2]
                            + (z - roi.begin[3]) * out_stride[3];
                        for c in 0..nc {
                            let p_off = ((p_base + c) as usize) * elem_size;
                            let o_off = ((o_base + c) as usize) * elem_size;
                            out[o_off..o_off + elem_size]
                                .copy_from_slice(&block.payload[p_off..p_off + elem_size]);
                        }
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stitches_two_adjacent_blocks_into_one_buffer() {
        let roi = Roi::new([0, 0, 0, 0, 0], [1, 4, 1, 1, 1]).unwrap();
        let left = StitchBlock {
            begin: [0, 0, 0, 0, 0],
            end: [1, 2, 1, 1, 0],
            payload: vec![1, 2],
            payload_shape: [1, 2, 1, 1, 1],
        };
        let right = StitchBlock {
            begin: [0, 2, 0, 0, 0],
            end: [1, 4, 1, 1, 0],
            payload: vec![3, 4],
            payload_shape: [1, 2, 1, 1, 1],
        };
        let out = stitch_and_crop(&[left, right], &roi, 1);
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn crops_a_block_that_overhangs_the_roi() {
        let roi = Roi::new([0, 1, 0, 0, 0], [1, 3, 1, 1, 1]).unwrap();
        let block = StitchBlock {
            begin: [0, 0, 0, 0, 0],
            end: [1, 4, 1, 1, 0],
            payload: vec![10, 11, 12, 13],
            payload_shape: [1, 4, 1, 1, 1],
        };
        let out = stitch_and_crop(&[block], &roi, 1);
        assert_eq!(out, vec![11, 12]);
    }

    #[test]
    fn mismatched_channel_counts_copy_only_the_overlap() {
        let roi = Roi::new([0, 0, 0, 0, 0], [1, 1, 1, 1, 3]).unwrap();
        let block = StitchBlock {
            begin: [0, 0, 0, 0, 0],
            end: [1, 1, 1, 1, 0],
            payload: vec![7, 8],
            payload_shape: [1, 1, 1, 1, 2],
        };
        let out = stitch_and_crop(&[block], &roi, 1);
        assert_eq!(out, vec![7, 8, 0]);
    }
}
