//! Music import and deletion handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use fable_models::{MusicCategory, MusicTrack};
use fable_pipeline::{ImportRequest, ImportSource};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Request body for music import.
///
/// Exactly one of `source_url` and `platform_ref` must be set.
#[derive(Debug, Deserialize)]
pub struct MusicImportRequest {
    pub name: String,
    pub category: String,
    pub source_url: Option<String>,
    pub platform_ref: Option<String>,
}

/// POST /api/music/import
pub async fn import_music(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<MusicImportRequest>,
) -> ApiResult<Json<MusicTrack>> {
    let category = MusicCategory::from_str(&request.category).ok_or_else(|| {
        ApiError::bad_request(format!("Unknown music category '{}'", request.category))
    })?;

    let source = match (request.source_url, request.platform_ref) {
        (Some(url), None) => ImportSource::Url(url),
        (None, Some(reference)) => ImportSource::PlatformRef(reference),
        _ => {
            return Err(ApiError::bad_request(
                "Exactly one of 'source_url' and 'platform_ref' must be provided",
            ))
        }
    };

    let track = state
        .import
        .import(
            &user.uid,
            ImportRequest {
                name: request.name,
                category,
                source,
            },
        )
        .await?;

    Ok(Json(track))
}

/// Response for track deletion.
#[derive(Serialize)]
pub struct DeleteTrackResponse {
    pub deleted: bool,
    /// Number of stories whose music reference was detached.
    pub detached_stories: u32,
}

/// DELETE /api/music/:track_id
pub async fn delete_music(
    State(state): State<AppState>,
    user: AuthUser,
    Path(track_id): Path<String>,
) -> ApiResult<Json<DeleteTrackResponse>> {
    let detached = state.import.delete_track(&user.uid, &track_id).await?;

    info!(user_id = %user.uid, track_id = %track_id, detached, "Music track deleted");
    Ok(Json(DeleteTrackResponse {
        deleted: true,
        detached_stories: detached,
    }))
}
