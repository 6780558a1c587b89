//! Client seams for both halves of the bus, consumed by the gateway, the
//! classifier worker, and the completion collector.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bp_types::{BlockId, PipelineError};
use futures::{Stream, StreamExt};

#[async_trait]
pub trait TaskQueueClient: Send + Sync {
    async fn enqueue(&self, id: BlockId) -> Result<(), PipelineError>;
    /// Leases at most one task; returns `None` on timeout with nothing available.
    async fn lease(&self, timeout: Duration) -> Result<Option<BlockId>, PipelineError>;
}

#[async_trait]
pub trait FinishedBusClient: Send + Sync {
    async fn publish(&self, id: BlockId) -> Result<(), PipelineError>;

    /// A live stream of completions from this moment forward. Late
    /// subscribers do not see events published before the stream opened
    /// (§4.4).
    async fn subscribe(&self) -> Result<Pin<Box<dyn Stream<Item = BlockId> + Send>>, PipelineError>;
}

pub struct HttpBusClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpBusClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TaskQueueClient for HttpBusClient {
    async fn enqueue(&self, id: BlockId) -> Result<(), PipelineError> {
        let url = format!("{}/bus/tasks", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "id": id.0 }))
            .send()
            .await
            .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(PipelineError::RemoteFetch(format!("task enqueue returned {}", resp.status())));
        }
        Ok(())
    }

    async fn lease(&self, timeout: Duration) -> Result<Option<BlockId>, PipelineError> {
        let url = format!(
            "{}/bus/tasks/lease?timeout_ms={}",
            self.base_url,
            timeout.as_millis()
        );
        let resp = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(PipelineError::RemoteFetch(format!("task lease returned {}", resp.status())));
        }
        #[derive(serde::Deserialize)]
        struct Body {
            id: u64,
        }
        let body: Body = resp.json().await.map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        Ok(Some(BlockId(body.id)))
    }
}

#[async_trait]
impl FinishedBusClient for HttpBusClient {
    async fn publish(&self, id: BlockId) -> Result<(), PipelineError> {
        let url = format!("{}/bus/finished", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "id": id.0 }))
            .send()
            .await
            .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(PipelineError::RemoteFetch(format!("finished publish returned {}", resp.status())));
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<Pin<Box<dyn Stream<Item = BlockId> + Send>>, PipelineError> {
        let url = format!("{}/bus/finished/stream", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PipelineError::RemoteFetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(PipelineError::RemoteFetch(format!("finished subscribe returned {}", resp.status())));
        }

        let byte_stream = resp.bytes_stream();
        let parsed = byte_stream.filter_map(|chunk| async move {
            let chunk = chunk.ok()?;
            parse_sse_block_ids(&chunk)
        });
        // Flatten the occasional chunk containing more than one event.
        let flattened = parsed.flat_map(futures::stream::iter);
        Ok(Box::pin(flattened))
    }
}

/// Parses `data: <decimal id>` SSE lines out of one chunk. Returns the ids
/// found, oldest first, or `None` if the chunk carried no data lines.
fn parse_sse_block_ids(chunk: &[u8]) -> Option<Vec<BlockId>> {
    let text = std::str::from_utf8(chunk).ok()?;
    let ids: Vec<BlockId> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")))
        .filter_map(|payload| payload.trim().parse::<u64>().ok())
        .map(BlockId)
        .collect();
    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_event_per_line() {
        let chunk = b"data: 3\n\ndata: 4\n\n";
        assert_eq!(
            parse_sse_block_ids(chunk),
            Some(vec![BlockId(3), BlockId(4)])
        );
    }

    #[test]
    fn ignores_non_data_lines() {
        assert_eq!(parse_sse_block_ids(b": keep-alive\n\n"), None);
    }
}
