//! Credit ledger data models.
//!
//! The ledger is append-only: the balance is always the signed sum of an
//! identity's entries and is never stored as an independently mutable
//! field that could drift from the entry log.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reason code attached to every ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    /// Charge for generated scene audio.
    DeductionAudio,
    /// Refund for scene audio that was charged in error.
    RefundAudio,
    /// Credits granted (plan purchase, signup bonus).
    Grant,
    /// Manual admin adjustment (correction, goodwill).
    AdminAdjustment,
}

impl LedgerReason {
    /// Reason code as a stable string for storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeductionAudio => "deduction_audio",
            Self::RefundAudio => "refund_audio",
            Self::Grant => "grant",
            Self::AdminAdjustment => "admin_adjustment",
        }
    }

    /// Parse from a stored string, rejecting unknown codes.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "deduction_audio" => Some(Self::DeductionAudio),
            "refund_audio" => Some(Self::RefundAudio),
            "grant" => Some(Self::Grant),
            "admin_adjustment" => Some(Self::AdminAdjustment),
            _ => None,
        }
    }
}

/// An immutable credit ledger entry.
///
/// `amount` is signed: deductions are negative, refunds and grants are
/// positive. Entries are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LedgerEntry {
    /// Unique identifier for this entry (UUID).
    pub id: String,

    /// Identity the entry belongs to.
    pub user_id: String,

    /// Signed credit amount.
    pub amount: i64,

    /// Reason code for the entry.
    pub reason: LedgerReason,

    /// Free-text note describing the operation.
    pub note: String,

    /// Correlated story, if the entry was produced by a batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_id: Option<String>,

    /// Correlation id for idempotent replay (e.g. a batch id).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a new entry stamped with the current time.
    pub fn new(
        user_id: impl Into<String>,
        amount: i64,
        reason: LedgerReason,
        note: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            amount,
            reason,
            note: note.into(),
            story_id: None,
            correlation_id: None,
            created_at: Utc::now(),
        }
    }

    /// Attach a story id.
    pub fn with_story_id(mut self, story_id: impl Into<String>) -> Self {
        self.story_id = Some(story_id.into());
        self
    }

    /// Attach a correlation id.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Sum the signed amounts of a slice of entries.
pub fn sum_entries(entries: &[LedgerEntry]) -> i64 {
    entries.iter().map(|e| e.amount).sum()
}
