//! Speech synthesis collaborator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use fable_models::VoiceId;

use crate::error::{PipelineError, PipelineResult};

/// Request timeout for synthesis calls.
const SYNTH_TIMEOUT: Duration = Duration::from_secs(60);

/// Synthesis model passed to the engine.
const SYNTH_MODEL: &str = "fable-tts-1";

/// Produces narration audio for scene text.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice`, returning encoded audio bytes.
    async fn synthesize(&self, text: &str, voice: VoiceId) -> PipelineResult<Vec<u8>>;
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    voice: &'a str,
    model: &'a str,
}

/// HTTP client for the external synthesis engine.
#[derive(Clone)]
pub struct HttpSynthesizer {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpSynthesizer {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(SYNTH_TIMEOUT)
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
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, voice: VoiceId) -> PipelineResult<Vec<u8>> {
        debug!(voice = %voice, chars = text.len(), "Requesting speech synthesis");

        let response = self
            .client
            .post(format!("{}/v1/synthesize", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&SynthesisRequest {
                text,
                voice: voice.as_str(),
                model: SYNTH_MODEL,
            })
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

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Upstream {
                status: 0,
                message: e.to_string(),
            })?;

        Ok(bytes.to_vec())
    }
}
