//! Cache client seam, consumed by the gateway and the classifier worker.

use async_trait::async_trait;
use bp_types::{BlockDescriptor, BlockId, PipelineError};

/// Outcome mirrored from [`crate::store::GetOutcome`] but without the
/// server-internal `Instant`/eviction bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheGet {
    Payload(Vec<u8>, BlockDescriptor),
    Placeholder,
    Absent,
}

#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn get(&self, id: BlockId, insert_placeholder: bool) -> Result<CacheGet, PipelineError>;
    async fn put(&self, id: BlockId, payload: Vec<u8>, descriptor: BlockDescriptor) -> Result<(), PipelineError>;
    async fn list(&self) -> Result<Vec<BlockId>, PipelineError>;
    async fn clear(&self) -> Result<(), PipelineError>;
}

const DESCRIPTOR_HEADER: &str = "x-block-descriptor";

pub struct HttpCacheClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpCacheClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CacheClient for HttpCacheClient {
    async fn get(&self, id: BlockId, insert_placeholder: bool) -> Result<CacheGet, PipelineError> {
        let url = format!("{}/cache/{}?insert_placeholder={}", self.base_url, id.0, insert_placeholder);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;

        match resp.status().as_u16() {
            200 => {
                let descriptor_raw = resp
                    .headers()
                    .get(DESCRIPTOR_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?
                    .to_vec();
                match descriptor_raw.as_deref().and_then(BlockDescriptor::decode) {
                    // Malformed descriptor: treat as absent and, if requested,
                    // the caller will have already had a placeholder installed
                    // server-side on the re-probe below (§4.2 failure mode).
                    Some(BlockDescriptor::Placeholder) | None => {
                        if insert_placeholder {
                            return self.get(id, true).await;
                        }
                        Ok(CacheGet::Absent)
                    }
                    Some(payload_descriptor) => Ok(CacheGet::Payload(bytes, payload_descriptor)),
                }
            }
            204 => Ok(CacheGet::Placeholder),
            404 => Ok(CacheGet::Absent),
            other => Err(PipelineError::RemoteFetch(format!("cache GET returned {other}"))),
        }
    }

    async fn put(&self, id: BlockId, payload: Vec<u8>, descriptor: BlockDescriptor) -> Result<(), PipelineError> {
        let url = format!("{}/cache/{}", self.base_url, id.0);
        let resp = self
            .http
            .put(&url)
            .header(DESCRIPTOR_HEADER, descriptor.encode())
            .body(payload)
            .send()
            .await
            .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(PipelineError::RemoteFetch(format!("cache PUT returned {}", resp.status())));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<BlockId>, PipelineError> {
        let url = format!("{}/cache", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        let ids: Vec<u64> = resp.json().await.map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        Ok(ids.into_iter().map(BlockId).collect())
    }

    async fn clear(&self) -> Result<(), PipelineError> {
        let url = format!("{}/cache", self.base_url);
        self.http
            .delete(&url)
            .send()
            .await
            .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        Ok(())
    }
}
