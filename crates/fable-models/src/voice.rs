//! Synthesis voice enumeration.
//!
//! Voices form a closed set. Legacy alias keys from older clients are
//! translated explicitly; an unrecognized key falls back to the default
//! voice as a deliberate, logged policy rather than a silent default.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A supported synthesis voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VoiceId {
    /// Neutral narrator voice (default).
    Narrator,
    /// Warm female storyteller.
    Aria,
    /// Deep male storyteller.
    Atlas,
    /// Bright child-friendly voice.
    Pip,
}

impl VoiceId {
    /// The fallback voice used for unrecognized keys.
    pub const DEFAULT: VoiceId = VoiceId::Narrator;

    /// Stable key for storage and the synthesis API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Narrator => "narrator",
            Self::Aria => "aria",
            Self::Atlas => "atlas",
            Self::Pip => "pip",
        }
    }

    /// Parse a key, including legacy aliases, without fallback.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "narrator" => Some(Self::Narrator),
            "aria" => Some(Self::Aria),
            "atlas" => Some(Self::Atlas),
            "pip" => Some(Self::Pip),
            // Legacy aliases kept for stories created before the rename.
            "female_warm" => Some(Self::Aria),
            "male_deep" => Some(Self::Atlas),
            "default" => Some(Self::Narrator),
            _ => None,
        }
    }

    /// Resolve a caller-supplied key to a voice.
    ///
    /// Unrecognized keys resolve to [`VoiceId::DEFAULT`] and the fallback
    /// is logged so it stays auditable.
    pub fn resolve(s: &str) -> Self {
        match Self::from_str(s) {
            Some(v) => v,
            None => {
                warn!(voice_key = %s, fallback = %Self::DEFAULT.as_str(), "Unknown voice key, using fallback voice");
                Self::DEFAULT
            }
        }
    }
}

impl std::fmt::Display for VoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_keys() {
        assert_eq!(VoiceId::from_str("aria"), Some(VoiceId::Aria));
        assert_eq!(VoiceId::from_str("atlas"), Some(VoiceId::Atlas));
    }

    #[test]
    fn test_legacy_aliases() {
        assert_eq!(VoiceId::from_str("female_warm"), Some(VoiceId::Aria));
        assert_eq!(VoiceId::from_str("male_deep"), Some(VoiceId::Atlas));
        assert_eq!(VoiceId::from_str("default"), Some(VoiceId::Narrator));
    }

    #[test]
    fn test_unknown_key_falls_back() {
        assert_eq!(VoiceId::from_str("robot9000"), None);
        assert_eq!(VoiceId::resolve("robot9000"), VoiceId::DEFAULT);
    }
}
