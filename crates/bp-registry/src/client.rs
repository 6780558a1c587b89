//! Registry client seam. Services talk to the registry exclusively through
//! this trait so the gateway/worker/thresholder setup paths never touch the
//! HTTP wire format directly (mirrors the teacher's `WorkflowRepository`
//! wrapping raw `sqlx` access behind a narrow API).

use async_trait::async_trait;
use bp_types::{PipelineError, RegistryKey, RegistryValue};

#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn get(&self, key: RegistryKey) -> Result<Option<RegistryValue>, PipelineError>;
    async fn set(&self, key: RegistryKey, value: RegistryValue) -> Result<(), PipelineError>;
    async fn remove(&self, key: RegistryKey, value: &str) -> Result<(), PipelineError>;
    async fn log(&self, level: &str, service_id: &str, message: &str) -> Result<(), PipelineError>;
}

/// HTTP-backed client for a remote `bp-registry` server.
pub struct HttpRegistryClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpRegistryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn get(&self, key: RegistryKey) -> Result<Option<RegistryValue>, PipelineError> {
        let url = format!("{}/registry/{}", self.base_url, key.as_str());
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(PipelineError::RemoteFetch(format!(
                "registry GET {key:?} returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| PipelineError::RemoteFetch(e.to_string()))
    }

    async fn set(&self, key: RegistryKey, value: RegistryValue) -> Result<(), PipelineError> {
        let url = format!("{}/registry/{}", self.base_url, key.as_str());
        let resp = self
            .http
            .post(&url)
            .json(&value)
            .send()
            .await
            .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(PipelineError::RemoteFetch(format!(
                "registry SET {key:?} returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn remove(&self, key: RegistryKey, value: &str) -> Result<(), PipelineError> {
        let url = format!("{}/registry/{}/remove", self.base_url, key.as_str());
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "value": value }))
            .send()
            .await
            .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(PipelineError::RemoteFetch(format!(
                "registry REMOVE {key:?} returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn log(&self, level: &str, service_id: &str, message: &str) -> Result<(), PipelineError> {
        let url = format!("{}/registry/log", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "level": level,
                "service_id": service_id,
                "message": message,
            }))
            .send()
            .await
            .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(PipelineError::RemoteFetch(format!("registry LOG returned {}", resp.status())));
        }
        Ok(())
    }
}
