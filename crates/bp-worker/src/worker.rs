//! Classifier worker's per-task pipeline (`spec.md` §4.6).

use std::sync::Arc;

use bp_blocking::BlockGrid;
use bp_cache::{CacheClient, CacheGet};
use bp_bus::FinishedBusClient;
use bp_types::{BlockDescriptor, BlockId, Coord5, Dtype, Roi, NDIM};

use crate::kernel::ClassifierKernel;
use crate::raw_client::RawClient;

/// Halo-expand `begin..end` by `halo` per spatial axis, clamped to `[0, shape)`.
fn expand_with_halo(begin: Coord5, end: Coord5, halo: Coord5, shape: Coord5) -> (Coord5, Coord5) {
    let mut out_begin = [0u64; NDIM];
    let mut out_end = [0u64; NDIM];
    for i in 0..NDIM {
        out_begin[i] = begin[i].saturating_sub(halo[i]);
        out_end[i] = (end[i] + halo[i]).min(shape[i]);
    }
    (out_begin, out_end)
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("raw fetch failed: {0}")]
    RawFetch(#[from] bp_types::PipelineError),
    #[error("kernel inference failed: {0}")]
    Kernel(String),
}

/// Runs one block-compute task end to end. On success, publishes completion.
/// On any failure the placeholder is left untouched in the cache (§4.6,
/// §7): the caller logs and moves on, per "Worker exception" semantics.
pub async fn process_task(
    grid: &BlockGrid,
    volume_shape: Coord5,
    id: BlockId,
    raw: &dyn RawClient,
    kernel: &dyn ClassifierKernel,
    cache: &Arc<dyn CacheClient>,
    bus: &Arc<dyn FinishedBusClient>,
) -> Result<(), TaskError> {
    // Idempotency guard against at-least-once task delivery (§4.6 step 1).
    if let CacheGet::Payload(..) = cache.get(id, false).await? {
        bus.publish(id).await?;
        return Ok(());
    }

    let block = grid.block(id)?;
    let halo = kernel.halo();
    let (raw_begin, raw_end) = expand_with_halo(block.begin, block.end, halo, volume_shape);
    let raw_roi = Roi::new(raw_begin, raw_end)?;

    let (raw_bytes, _raw_dtype) = raw.fetch_roi(&raw_roi).await?;
    let raw_shape = raw_roi.shape();
    let inner_shape = block.shape();

    let probs = kernel
        .infer(&raw_bytes, raw_shape, inner_shape)
        .await
        .map_err(|e| TaskError::Kernel(e.to_string()))?;

    let mut out_shape = inner_shape;
    out_shape[4] = kernel.num_classes() as u64;
    let descriptor = BlockDescriptor::Payload {
        shape: out_shape,
        dtype: Dtype::F32,
    };
    cache.put(id, probs, descriptor).await?;
    bus.publish(id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halo_expansion_clamps_to_volume_bounds() {
        let (b, e) = expand_with_halo([0, 0, 0, 0, 0], [1, 8, 8, 1, 1], [0, 4, 4, 0, 0], [1, 10, 10, 1, 1]);
        assert_eq!(b, [0, 0, 0, 0, 0]);
        assert_eq!(e, [1, 10, 10, 1, 1]);
    }
}
