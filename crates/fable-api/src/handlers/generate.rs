//! Scene batch generation handler.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use fable_models::{BatchResult, VoiceId};
use fable_pipeline::CancelFlag;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// Request body for batch generation.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Voice key; unknown keys fall back to the default voice.
    pub voice_id: Option<String>,
}

/// POST /api/stories/:story_id/generate
///
/// Runs the full scene batch for a story and returns the per-scene
/// outcomes. Partial failure is a 200: the response body reports which
/// scenes failed and what was charged.
pub async fn generate_story_audio(
    State(state): State<AppState>,
    user: AuthUser,
    Path(story_id): Path<String>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<BatchResult>> {
    let voice = request
        .voice_id
        .as_deref()
        .map(VoiceId::resolve)
        .unwrap_or(VoiceId::DEFAULT);

    info!(user_id = %user.uid, story_id = %story_id, voice = %voice, "Batch generation requested");

    let result = state
        .orchestrator
        .generate(&user.uid, &story_id, voice, CancelFlag::new())
        .await?;

    Ok(Json(result))
}
