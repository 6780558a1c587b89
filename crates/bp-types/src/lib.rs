//! Shared types for the prediction pipeline: coordinate algebra primitives,
//! cache descriptors, registry keys, block identifiers, and the error
//! taxonomy every service-facing crate converts into an HTTP response.

pub mod block_id;
pub mod coord;
pub mod descriptor;
pub mod error;
pub mod registry;

pub use block_id::BlockId;
pub use coord::{Coord5, Dim, Dtype, Roi, NDIM};
pub use descriptor::BlockDescriptor;
pub use error::PipelineError;
pub use registry::{RegistryKey, RegistryValue};
