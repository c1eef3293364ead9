//! Per-scene generation outcomes and batch results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::timestamp::WordTimestamp;

/// Stages a scene moves through during generation.
///
/// `Aligning` failure is non-terminal: the scene downgrades to persisting
/// without word timestamps instead of failing. Every other stage failure
/// is terminal for that scene only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStage {
    Pending,
    Synthesizing,
    Measuring,
    Aligning,
    Persisting,
    Done,
}

impl GenerationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synthesizing => "synthesizing",
            Self::Measuring => "measuring",
            Self::Aligning => "aligning",
            Self::Persisting => "persisting",
            Self::Done => "done",
        }
    }
}

/// Terminal result for one scene in a batch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SceneResult {
    /// The scene's audio artifact was generated and persisted.
    Done {
        audio_url: String,
        duration: f64,
        /// `None` when alignment failed; the audio is still valid.
        word_timestamps: Option<Vec<WordTimestamp>>,
    },
    /// The scene failed at a terminal stage. Sibling scenes are unaffected.
    Failed {
        stage: GenerationStage,
        reason: String,
    },
}

impl SceneResult {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// Outcome for one scene, in original ordinal order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SceneOutcome {
    pub scene_id: String,
    pub position: u32,
    #[serde(flatten)]
    pub result: SceneResult,
}

/// Aggregated result of a batch generation run.
///
/// `successful_scenes / total_scenes` is always reported, even when the
/// ratio is less than one.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchResult {
    pub story_id: String,
    /// Per-scene outcomes in ordinal order regardless of completion order.
    pub outcomes: Vec<SceneOutcome>,
    pub total_scenes: u32,
    pub successful_scenes: u32,
    /// Credits actually charged by the settle-up (0 if settle-up failed).
    pub credits_charged: i64,
}

impl BatchResult {
    /// Count of `Done` outcomes.
    pub fn done_count(outcomes: &[SceneOutcome]) -> u32 {
        outcomes.iter().filter(|o| o.result.is_done()).count() as u32
    }
}
