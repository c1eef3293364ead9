//! The fable acquisition and accounting pipeline.
//!
//! Drives the per-scene generation loop (synthesize, measure, align,
//! replace artifact, update record), the single-resource music import, and
//! the accounting that must stay accurate under partial failure: the
//! credit ledger charges exactly for the work that actually completed, and
//! the fixed-window rate limiter guards abusable import operations.

pub mod align;
pub mod batch;
pub mod error;
pub mod import;
pub mod ledger;
pub mod rate_limit;
pub mod repos;
pub mod synth;

pub use align::{ForcedAligner, HttpAligner};
pub use batch::{BatchConfig, CancelFlag, SceneBatchOrchestrator};
pub use error::{PipelineError, PipelineResult};
pub use import::{ImportPipeline, ImportRequest, ImportSource, MediaFetcher, ResourceFetcher};
pub use ledger::{CreditLedger, LedgerStore, MemoryLedgerStore};
pub use rate_limit::{FixedWindowLimiter, OperationClass, RateDecision, RatePolicy};
pub use repos::{
    MemorySceneRepository, MemoryTrackRepository, SceneMediaUpdate, SceneRepository,
    TrackRepository,
};
pub use synth::{HttpSynthesizer, SpeechSynthesizer};
