//! Shared error taxonomy (§7). Each service-facing crate reuses
//! [`PipelineError`] at its HTTP seam rather than inventing a parallel
//! enum, the way the teacher shares `CargoRefParseError` across
//! `ob-workflow` modules.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed ROI, non-5-D coordinates, reversed extents.
    #[error("validation error: {0}")]
    Validation(String),

    /// `/setup` before the registry is populated, or with no worker registered.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Non-2xx from a remote peer after the bounded retry policy was exhausted.
    #[error("remote fetch failed after retries: {0}")]
    RemoteFetch(String),

    /// A completion event fired but the cache yielded a placeholder or
    /// nothing at all: bus/cache divergence, fatal by definition (§4.5, §7).
    #[error("cache protocol violation for block {block_id}: {detail}")]
    CacheProtocolViolation { block_id: u64, detail: String },

    /// Registry `get`/`set`/`remove` against an unrecognized key.
    #[error("unknown registry key: {0}")]
    UnknownRegistryKey(String),
}

impl PipelineError {
    /// Maps onto the HTTP status classes defined in SPEC_FULL.md §7.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::Validation(_) => 400,
            PipelineError::UnknownRegistryKey(_) => 400,
            PipelineError::Configuration(_) => 503,
            PipelineError::RemoteFetch(_) => 502,
            PipelineError::CacheProtocolViolation { .. } => 500,
        }
    }
}
