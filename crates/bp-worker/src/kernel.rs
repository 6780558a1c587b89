//! The classifier compute kernel (out of scope per `spec.md` §1: an opaque
//! compute kernel, specified only by its block-in/block-out contract).

use async_trait::async_trait;
use bp_types::{Coord5, PipelineError};

#[async_trait]
pub trait ClassifierKernel: Send + Sync {
    /// Extra raw voxels required around a block's inner region to compute
    /// features at its boundary, one value per spatial axis (§4.6 step 2).
    /// Managing the halo is the kernel's own capability, not the scheduler's.
    fn halo(&self) -> Coord5;

    fn num_classes(&self) -> usize;

    /// `raw` is the halo-expanded raw buffer (`raw_shape`, `raw_dtype`
    /// densely packed). Returns per-class probabilities as densely packed
    /// `f32`, whose spatial extent equals `inner_shape` and whose channel
    /// axis equals `num_classes()`.
    async fn infer(
        &self,
        raw: &[u8],
        raw_shape: Coord5,
        inner_shape: Coord5,
    ) -> Result<Vec<u8>, PipelineError>;
}

/// Test double used by the coalescing/round-trip scenarios in
/// SPEC_FULL.md §8 scenario 1/2: zero halo, constant zero probabilities.
pub struct ConstantClassifierKernel {
    pub num_classes: usize,
    pub invocations: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl ConstantClassifierKernel {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            invocations: std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0)),
        }
    }
}

#[async_trait]
impl ClassifierKernel for ConstantClassifierKernel {
    fn halo(&self) -> Coord5 {
        [0, 0, 0, 0, 0]
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    async fn infer(&self, _raw: &[u8], _raw_shape: Coord5, inner_shape: Coord5) -> Result<Vec<u8>, PipelineError> {
        self.invocations.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let voxels: u64 = inner_shape[0] * inner_shape[1] * inner_shape[2] * inner_shape[3] * self.num_classes as u64;
        Ok(vec![0u8; (voxels as usize) * 4])
    }
}
