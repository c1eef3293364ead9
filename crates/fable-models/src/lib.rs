//! Shared domain models for the fable story pipeline.
//!
//! This crate holds the types passed between the storage, media, pipeline
//! and API layers: scenes and their word-level timing, the credit ledger
//! records, the voice enumeration, music tracks and batch outcomes.

pub mod ledger;
pub mod music;
pub mod outcome;
pub mod scene;
pub mod timestamp;
pub mod voice;

pub use ledger::{LedgerEntry, LedgerReason};
pub use music::{MusicCategory, MusicTrack};
pub use outcome::{BatchResult, GenerationStage, SceneOutcome, SceneResult};
pub use scene::Scene;
pub use timestamp::WordTimestamp;
pub use voice::VoiceId;

/// Credits charged per successfully generated scene audio.
pub const AUDIO_CREDIT_COST: i64 = 1;
