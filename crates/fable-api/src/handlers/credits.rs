//! Credit balance and history handler.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use fable_models::LedgerEntry;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// Maximum number of history entries returned.
const MAX_LIMIT: usize = 100;

/// Query parameters for the credits endpoint.
#[derive(Debug, Deserialize)]
pub struct CreditsQuery {
    /// Maximum number of entries to return (clamped to 1..100).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// One ledger row, serialized for clients.
#[derive(Serialize)]
pub struct LedgerEntryResponse {
    pub id: String,
    pub amount: i64,
    pub reason: String,
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_id: Option<String>,
    pub created_at: String,
}

impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            amount: entry.amount,
            reason: entry.reason.as_str().to_string(),
            note: entry.note,
            story_id: entry.story_id,
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// Credits response: current balance plus recent entries.
#[derive(Serialize)]
pub struct CreditsResponse {
    pub balance: i64,
    /// Most recent entries first.
    pub entries: Vec<LedgerEntryResponse>,
}

/// GET /api/credits
pub async fn get_credits(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CreditsQuery>,
) -> ApiResult<Json<CreditsResponse>> {
    let limit = query.limit.clamp(1, MAX_LIMIT);

    let balance = state.ledger.balance(&user.uid).await?;
    let mut entries = state.ledger.history(&user.uid).await?;

    entries.reverse();
    entries.truncate(limit);

    Ok(Json(CreditsResponse {
        balance,
        entries: entries.into_iter().map(Into::into).collect(),
    }))
}
