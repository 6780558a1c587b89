pub mod cc;
pub mod gateway_client;
pub mod smoothing;

use bp_types::{coord::Coord5, Dim, PipelineError, Roi};
use gateway_client::GatewayClient;
use ndarray::Array3;

/// Parameters pulled from the registry (`THRESHOLD_VALUE`, `THRESHOLD_CHANNEL`,
/// `THRESHOLD_SIGMAS`) that parameterize one `label_frame` call.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdParams {
    pub channel: u64,
    pub value: f32,
    pub sigmas: [f32; 3],
}

/// Runs `spec.md` §4.7 steps 1-5 for one time frame: fetch the stitched
/// per-class probability volume from the gateway, smooth one channel,
/// binary-threshold it, label connected components, and reinsert the
/// singleton `t`/`c` axes the wire format requires. Returns the raw
/// little-endian `uint32` label-image bytes and their 5-D shape.
pub async fn label_frame(
    gateway: &GatewayClient,
    roi: &Roi,
    dim: Dim,
    params: ThresholdParams,
) -> Result<(Vec<u8>, Coord5), PipelineError> {
    if !roi.is_single_frame() {
        return Err(PipelineError::Validation(
            "labelimage requires a single-time-frame ROI".into(),
        ));
    }

    let shape = roi.shape();
    let num_classes = shape[4];
    if params.channel >= num_classes {
        return Err(PipelineError::Configuration(format!(
            "threshold channel {} out of range for {num_classes} classes",
            params.channel
        )));
    }

    let bytes = gateway.fetch_prediction_roi(roi).await?;
    let volume = extract_channel(&bytes, shape, params.channel)?;

    let smoothed = smoothing::gaussian_smooth(&volume, params.sigmas);
    let mask = cc::threshold(&smoothed, params.value);
    let labels = cc::connected_components(&mask, dim);

    let out_shape: Coord5 = [1, shape[1], shape[2], shape[3], 1];
    Ok((encode_labels(&labels), out_shape))
}

/// Picks a single channel out of a densely packed `(1, x, y, z, c)` float32
/// buffer (row-major, `c` fastest), returning it as an `(x, y, z)` array.
fn extract_channel(bytes: &[u8], shape: Coord5, channel: u64) -> Result<Array3<f32>, PipelineError> {
    let (nx, ny, nz, nc) = (shape[1] as usize, shape[2] as usize, shape[3] as usize, shape[4] as usize);
    let expected = nx * ny * nz * nc * 4;
    if bytes.len() != expected {
        return Err(PipelineError::RemoteFetch(format!(
            "prediction buffer length {} does not match expected {expected} for shape {shape:?}",
            bytes.len()
        )));
    }
    let mut out = Array3::<f32>::zeros((nx, ny, nz));
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                let voxel = ((x * ny + y) * nz + z) * nc + channel as usize;
                let off = voxel * 4;
                let v = f32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
                out[[x, y, z]] = v;
            }
        }
    }
    Ok(out)
}

/// Encodes an `(x, y, z)` label array as little-endian `uint32` bytes with
/// the singleton `t` and `c` axes implicit (row-major, matching the raw
/// wire format of §6).
fn encode_labels(labels: &Array3<u32>) -> Vec<u8> {
    let (nx, ny, nz) = labels.dim();
    let mut out = Vec::with_capacity(nx * ny * nz * 4);
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                out.extend_from_slice(&labels[[x, y, z]].to_le_bytes());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_channel_picks_the_requested_class() {
        // shape (1,2,2,1,2): two classes per voxel, channel 1 is all 9.0
        let shape: Coord5 = [1, 2, 2, 1, 2];
        let mut bytes = Vec::new();
        for _ in 0..(2 * 2 * 1) {
            bytes.extend_from_slice(&1.0f32.to_le_bytes());
            bytes.extend_from_slice(&9.0f32.to_le_bytes());
        }
        let vol = extract_channel(&bytes, shape, 1).unwrap();
        assert!(vol.iter().all(|&v| v == 9.0));
    }

    #[test]
    fn label_encoding_round_trips_through_byte_layout() {
        let mut labels = Array3::<u32>::zeros((2, 2, 1));
        labels[[1, 0, 0]] = 7;
        let bytes = encode_labels(&labels);
        assert_eq!(bytes.len(), 2 * 2 * 1 * 4);
        let idx = (1 * 2 + 0) * 1 + 0;
        let off = idx * 4;
        assert_eq!(u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap()), 7);
    }
}
