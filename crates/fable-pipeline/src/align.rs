//! Forced word-alignment collaborator.
//!
//! Alignment is an enhancement, not a correctness requirement of the
//! audio artifact: callers treat failure as non-fatal and persist the
//! scene without word timestamps.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use fable_models::WordTimestamp;

use crate::error::{PipelineError, PipelineResult};

/// Request timeout for alignment calls.
const ALIGN_TIMEOUT: Duration = Duration::from_secs(60);

/// Aligns narration audio against its source text.
#[async_trait]
pub trait ForcedAligner: Send + Sync {
    /// Word-level timeline for `audio` against `text`.
    async fn align(&self, audio: &[u8], text: &str) -> PipelineResult<Vec<WordTimestamp>>;
}

#[derive(Deserialize)]
struct AlignmentResponse {
    words: Vec<AlignedWord>,
}

#[derive(Deserialize)]
struct AlignedWord {
    word: String,
    start: f64,
    end: f64,
}

/// HTTP client for the external alignment engine.
#[derive(Clone)]
pub struct HttpAligner {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpAligner {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(ALIGN_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::internal(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl ForcedAligner for HttpAligner {
    async fn align(&self, audio: &[u8], text: &str) -> PipelineResult<Vec<WordTimestamp>> {
        debug!(audio_bytes = audio.len(), chars = text.len(), "Requesting forced alignment");

        let response = self
            .client
            .post(format!("{}/v1/align", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("text", text)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| PipelineError::Upstream {
                status: 0,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Upstream {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: AlignmentResponse =
            response.json().await.map_err(|e| PipelineError::Upstream {
                status: 0,
                message: e.to_string(),
            })?;

        Ok(parsed
            .words
            .into_iter()
            .map(|w| WordTimestamp::new(w.word, w.start, w.end))
            .collect())
    }
}
