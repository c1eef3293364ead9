//! Scene data model.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::timestamp::WordTimestamp;
use crate::voice::VoiceId;

/// One ordered narration unit of a story.
///
/// The `position` is unique within a story and defines playback order.
/// Scenes are created when the story's scene list is established and
/// mutated in place on each (re)generation; this pipeline never deletes
/// them.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// Unique scene identifier.
    pub id: String,

    /// Owning story.
    pub story_id: String,

    /// Ordinal position within the story (0-based, unique per story).
    pub position: u32,

    /// Narration source text.
    pub text: String,

    /// Public URL of the current audio artifact, if generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    /// Duration of the current audio artifact in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_duration: Option<f64>,

    /// Voice the current audio was synthesized with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<VoiceId>,

    /// Word-level timing from forced alignment. `None` is a valid terminal
    /// state: alignment can fail independently of synthesis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_timestamps: Option<Vec<WordTimestamp>>,

    /// When the current audio was generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl Scene {
    /// Create a scene with no generated media.
    pub fn new(
        id: impl Into<String>,
        story_id: impl Into<String>,
        position: u32,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            story_id: story_id.into(),
            position,
            text: text.into(),
            audio_url: None,
            audio_duration: None,
            voice_id: None,
            word_timestamps: None,
            generated_at: None,
        }
    }

    /// Whether this scene currently has a generated audio artifact.
    pub fn has_audio(&self) -> bool {
        self.audio_url.is_some()
    }
}
