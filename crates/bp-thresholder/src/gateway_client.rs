//! HTTP client of the gateway's own prediction endpoint. Per Open Question
//! (c) (see DESIGN.md) the thresholder does not reimplement the gateway's
//! coalescing protocol — it is a plain caller of `/prediction/raw/roi`,
//! mirroring `bp_worker::raw_client::ReqwestRawClient`'s retry/header
//! conventions against a different upstream.

use bp_types::{Coord5, Dim, PipelineError, Roi};

const MAX_RETRIES: u32 = 5;

pub struct GatewayClient {
    base_url: String,
    http: reqwest::Client,
}

impl GatewayClient {
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
            tracing::warn!(url, attempt, error = %last_err, "gateway fetch attempt failed");
        }
        Err(PipelineError::RemoteFetch(format!(
            "GET {url} failed after {MAX_RETRIES} attempts: {last_err}"
        )))
    }

    /// Fetches the stitched, per-class float32 probability volume for `roi`
    /// from the gateway, in canonical `(t, x, y, z, c)` byte order.
    pub async fn fetch_prediction_roi(&self, roi: &Roi) -> Result<Vec<u8>, PipelineError> {
        let url = format!(
            "{}/prediction/raw/roi?extents_min={}&extents_max={}",
            self.base_url,
            bp_types::coord::format_underscore_coord(&roi.begin),
            bp_types::coord::format_underscore_coord(&roi.end),
        );
        let resp = self.get_with_retry(&url).await?;
        let bytes = resp.bytes().await.map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    pub async fn num_classes(&self) -> Result<u64, PipelineError> {
        let url = format!("{}/prediction/info/numclasses", self.base_url);
        let resp = self.get_with_retry(&url).await?;
        let text = resp.text().await.map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        text.trim()
            .parse()
            .map_err(|_| PipelineError::RemoteFetch(format!("unrecognized numclasses response: {text}")))
    }

    pub async fn raw_shape(&self) -> Result<Coord5, PipelineError> {
        let url = format!("{}/raw/info/shape", self.base_url);
        let resp = self.get_with_retry(&url).await?;
        let text = resp.text().await.map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        bp_types::coord::parse_underscore_coord(text.trim())
    }

    pub async fn dim(&self) -> Result<Dim, PipelineError> {
        let url = format!("{}/raw/info/dim", self.base_url);
        let resp = self.get_with_retry(&url).await?;
        let text = resp.text().await.map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        match text.trim() {
            "2" => Ok(Dim::Two),
            "3" => Ok(Dim::Three),
            other => Err(PipelineError::RemoteFetch(format!("unrecognized dim response: {other}"))),
        }
    }
}
