//! Word-level timing produced by forced alignment.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single aligned word with start/end offsets in seconds.
///
/// Sequences are ordered: `start <= end` within a word and starts are
/// monotonically non-decreasing across the sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WordTimestamp {
    /// The aligned word as it appears in the narration text.
    pub word: String,
    /// Start offset in seconds.
    pub start: f64,
    /// End offset in seconds.
    pub end: f64,
}

impl WordTimestamp {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
        }
    }
}

/// Check that a timeline is well-formed: each word has `start <= end` and
/// starts never go backwards.
pub fn is_monotonic(timeline: &[WordTimestamp]) -> bool {
    let mut prev_start = 0.0_f64;
    for ts in timeline {
        if ts.start < prev_start || ts.end < ts.start {
            return false;
        }
        prev_start = ts.start;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_timeline() {
        let timeline = vec![
            WordTimestamp::new("once", 0.0, 0.4),
            WordTimestamp::new("upon", 0.4, 0.7),
            WordTimestamp::new("a", 0.7, 0.8),
        ];
        assert!(is_monotonic(&timeline));
    }

    #[test]
    fn test_backwards_start_rejected() {
        let timeline = vec![
            WordTimestamp::new("once", 1.0, 1.4),
            WordTimestamp::new("upon", 0.4, 0.7),
        ];
        assert!(!is_monotonic(&timeline));
    }

    #[test]
    fn test_end_before_start_rejected() {
        let timeline = vec![WordTimestamp::new("once", 1.0, 0.5)];
        assert!(!is_monotonic(&timeline));
    }

    #[test]
    fn test_empty_timeline_is_valid() {
        assert!(is_monotonic(&[]));
    }
}
