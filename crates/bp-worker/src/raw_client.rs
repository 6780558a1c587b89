//! Client for the raw data server (out of scope per `spec.md` §1; this is
//! only the interface the core consumes). A thin file-backed HTTP accessor
//! on the other end, specified by `spec.md` §6.

use async_trait::async_trait;
use bp_types::{Coord5, Dtype, PipelineError, Roi};

#[async_trait]
pub trait RawClient: Send + Sync {
    /// Fetches densely packed little-endian voxels for `roi` in canonical
    /// axis order, plus the dtype the server reports.
    async fn fetch_roi(&self, roi: &Roi) -> Result<(Vec<u8>, Dtype), PipelineError>;
    async fn dtype(&self) -> Result<Dtype, PipelineError>;
    async fn shape(&self) -> Result<Coord5, PipelineError>;
}

const MAX_RETRIES: u32 = 5;

pub struct ReqwestRawClient {
    base_url: String,
    http: reqwest::Client,
}

impl ReqwestRawClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response, PipelineError> {
        let mut last_err = String::new();
        for attempt in 1..=MAX_RETRIES {
            match self.http.get(url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => last_err = format!("status {}", resp.status()),
                Err(e) => last_err = e.to_string(),
            }
            tracing::warn!(url, attempt, error = %last_err, "raw server fetch attempt failed");
        }
        Err(PipelineError::RemoteFetch(format!(
            "GET {url} failed after {MAX_RETRIES} attempts: {last_err}"
        )))
    }
}

#[async_trait]
impl RawClient for ReqwestRawClient {
    async fn fetch_roi(&self, roi: &Roi) -> Result<(Vec<u8>, Dtype), PipelineError> {
        let url = format!(
            "{}/raw/raw/roi?extents_min={}&extents_max={}",
            self.base_url,
            bp_types::coord::format_underscore_coord(&roi.begin),
            bp_types::coord::format_underscore_coord(&roi.end),
        );
        let resp = self.get_with_retry(&url).await?;
        let dtype_tag = resp
            .headers()
            .get("x-dtype")
            .and_then(|v| v.to_str().ok())
            .and_then(Dtype::parse)
            .ok_or_else(|| PipelineError::RemoteFetch("raw server response missing x-dtype header".into()))?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        Ok((bytes.to_vec(), dtype_tag))
    }

    async fn dtype(&self) -> Result<Dtype, PipelineError> {
        let url = format!("{}/info/dtype", self.base_url);
        let resp = self.get_with_retry(&url).await?;
        let text = resp.text().await.map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        Dtype::parse(text.trim()).ok_or_else(|| PipelineError::RemoteFetch(format!("unrecognized dtype: {text}")))
    }

    async fn shape(&self) -> Result<Coord5, PipelineError> {
        let url = format!("{}/info/shape", self.base_url);
        let resp = self.get_with_retry(&url).await?;
        let text = resp.text().await.map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        bp_types::coord::parse_underscore_coord(text.trim())
    }
}
