//! Background music track models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Category a music track belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MusicCategory {
    Calm,
    Upbeat,
    Dramatic,
    Ambient,
    Whimsical,
}

impl MusicCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calm => "calm",
            Self::Upbeat => "upbeat",
            Self::Dramatic => "dramatic",
            Self::Ambient => "ambient",
            Self::Whimsical => "whimsical",
        }
    }

    /// Parse a category key, rejecting unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "calm" => Some(Self::Calm),
            "upbeat" => Some(Self::Upbeat),
            "dramatic" => Some(Self::Dramatic),
            "ambient" => Some(Self::Ambient),
            "whimsical" => Some(Self::Whimsical),
            _ => None,
        }
    }
}

/// An imported or preset background music track.
///
/// Preset tracks are immutable and undeletable by ordinary identities.
/// Non-preset tracks may only be deleted by their uploader; on deletion,
/// all referencing stories are detached, never left dangling.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MusicTrack {
    /// Unique track identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Track category.
    pub category: MusicCategory,

    /// Public storage URL.
    pub url: String,

    /// Duration in seconds.
    pub duration: f64,

    /// Identity that imported the track.
    pub uploaded_by: String,

    /// Preset tracks ship with the product and cannot be deleted.
    pub is_preset: bool,

    /// When the track record was created.
    pub created_at: DateTime<Utc>,
}

impl MusicTrack {
    /// Create a non-preset track record.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: MusicCategory,
        url: impl Into<String>,
        duration: f64,
        uploaded_by: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            url: url.into(),
            duration,
            uploaded_by: uploaded_by.into(),
            is_preset: false,
            created_at: Utc::now(),
        }
    }

    /// Whether `user_id` may delete this track.
    pub fn deletable_by(&self, user_id: &str) -> bool {
        !self.is_preset && self.uploaded_by == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!(MusicCategory::from_str("calm"), Some(MusicCategory::Calm));
        assert_eq!(MusicCategory::from_str("metal"), None);
    }

    #[test]
    fn test_preset_not_deletable() {
        let mut track = MusicTrack::new("t1", "Rain", MusicCategory::Ambient, "u", 30.0, "user-a");
        assert!(track.deletable_by("user-a"));
        assert!(!track.deletable_by("user-b"));

        track.is_preset = true;
        assert!(!track.deletable_by("user-a"));
    }
}
