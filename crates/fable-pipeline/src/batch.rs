//! Scene batch orchestration.
//!
//! Drives the per-scene loop: synthesize, measure, align, replace the
//! stored artifact, update the scene record. Scene outcomes are
//! independent; one scene failing never aborts its siblings. Credits are
//! settled after the fact from the realized outcomes: one deduction for
//! the scenes that reached Done, never an upfront charge plus a refund of
//! the complement (a crash between those two steps would under-refund).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use fable_media::{AudioProber, TempResourceScope};
use fable_models::{
    BatchResult, GenerationStage, LedgerReason, Scene, SceneOutcome, SceneResult, VoiceId,
    AUDIO_CREDIT_COST,
};
use fable_storage::ArtifactReplacer;

use crate::align::ForcedAligner;
use crate::error::{PipelineError, PipelineResult};
use crate::ledger::CreditLedger;
use crate::repos::{SceneMediaUpdate, SceneRepository};
use crate::synth::SpeechSynthesizer;

/// Batch tuning knobs.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Credits charged per scene that reaches Done.
    pub unit_cost: i64,
    /// Bounded concurrency for scene processing; the external synthesis
    /// service has its own rate limits.
    pub max_concurrent_scenes: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            unit_cost: AUDIO_CREDIT_COST,
            max_concurrent_scenes: 2,
        }
    }
}

/// Cooperative cancellation for a batch.
///
/// In-flight scenes run to completion so the ledger and storage stay
/// consistent; no new scene starts once the flag is set.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrates one batch generation run over all scenes of a story.
#[derive(Clone)]
pub struct SceneBatchOrchestrator {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    aligner: Arc<dyn ForcedAligner>,
    prober: Arc<dyn AudioProber>,
    scenes: Arc<dyn SceneRepository>,
    replacer: ArtifactReplacer,
    ledger: CreditLedger,
    config: BatchConfig,
}

impl SceneBatchOrchestrator {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        aligner: Arc<dyn ForcedAligner>,
        prober: Arc<dyn AudioProber>,
        scenes: Arc<dyn SceneRepository>,
        replacer: ArtifactReplacer,
        ledger: CreditLedger,
        config: BatchConfig,
    ) -> Self {
        Self {
            synthesizer,
            aligner,
            prober,
            scenes,
            replacer,
            ledger,
            config,
        }
    }

    /// Generate audio for every scene of `story_id`.
    ///
    /// Pre-checks the upper-bound cost (`scene_count x unit_cost`) before
    /// any external call; the actual charge is computed from the realized
    /// outcomes at the end. The result list preserves ordinal order
    /// regardless of completion order.
    pub async fn generate(
        &self,
        user_id: &str,
        story_id: &str,
        voice: VoiceId,
        cancel: CancelFlag,
    ) -> PipelineResult<BatchResult> {
        let scenes = self.scenes.scenes_for_story(story_id).await?;
        if scenes.is_empty() {
            return Err(PipelineError::validation("Story has no scenes"));
        }

        let total_scenes = scenes.len() as u32;
        let required = total_scenes as i64 * self.config.unit_cost;
        let balance = self.ledger.balance(user_id).await?;
        if balance < required {
            return Err(PipelineError::InsufficientCredits {
                needed: required,
                balance,
            });
        }

        let batch_id = uuid::Uuid::new_v4().to_string();
        info!(
            user_id = %user_id,
            story_id = %story_id,
            batch_id = %batch_id,
            scenes = total_scenes,
            voice = %voice,
            "Starting scene batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_scenes.max(1)));

        let futures = scenes.into_iter().map(|scene| {
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let orchestrator = self.clone();
            async move {
                // The semaphore is never closed; treat a failed acquire
                // like a cancellation so the outcome list stays complete.
                let permit = semaphore.acquire().await;

                if permit.is_err() || cancel.is_cancelled() {
                    return SceneOutcome {
                        scene_id: scene.id.clone(),
                        position: scene.position,
                        result: SceneResult::Failed {
                            stage: GenerationStage::Pending,
                            reason: "Batch cancelled before scene started".to_string(),
                        },
                    };
                }

                let position = scene.position;
                let scene_id = scene.id.clone();
                let result = orchestrator.process_scene(scene, voice).await;
                SceneOutcome {
                    scene_id,
                    position,
                    result,
                }
            }
        });

        // join_all preserves input order, which is ordinal order.
        let outcomes: Vec<SceneOutcome> = join_all(futures).await;

        let done_count = BatchResult::done_count(&outcomes);
        let credits_charged = self
            .settle_up(user_id, story_id, &batch_id, done_count)
            .await;

        info!(
            story_id = %story_id,
            batch_id = %batch_id,
            successful = done_count,
            total = total_scenes,
            credits_charged,
            "Scene batch finished"
        );

        Ok(BatchResult {
            story_id: story_id.to_string(),
            outcomes,
            total_scenes,
            successful_scenes: done_count,
            credits_charged,
        })
    }

    /// Process one scene through its stages. Returns a terminal result;
    /// errors never propagate past the scene.
    async fn process_scene(&self, scene: Scene, voice: VoiceId) -> SceneResult {
        let scope = match TempResourceScope::create(&format!("scene-{}", scene.id)) {
            Ok(scope) => scope,
            Err(e) => {
                return SceneResult::Failed {
                    stage: GenerationStage::Pending,
                    reason: format!("Failed to create temp scope: {}", e),
                }
            }
        };

        // Synthesizing
        let audio = match self.synthesizer.synthesize(&scene.text, voice).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!(scene_id = %scene.id, error = %e, "Synthesis failed");
                return SceneResult::Failed {
                    stage: GenerationStage::Synthesizing,
                    reason: e.to_string(),
                };
            }
        };

        // Measuring
        let audio_path = scope.file_path("narration.mp3");
        if let Err(e) = tokio::fs::write(&audio_path, &audio).await {
            return SceneResult::Failed {
                stage: GenerationStage::Measuring,
                reason: format!("Failed to stage audio: {}", e),
            };
        }
        let duration = match self.prober.duration(&audio_path).await {
            Ok(duration) => duration,
            Err(e) => {
                warn!(scene_id = %scene.id, error = %e, "Duration probe failed");
                return SceneResult::Failed {
                    stage: GenerationStage::Measuring,
                    reason: e.to_string(),
                };
            }
        };

        // Aligning: failure downgrades to persisting without timestamps.
        let word_timestamps = match self.aligner.align(&audio, &scene.text).await {
            Ok(words) if fable_models::timestamp::is_monotonic(&words) => Some(words),
            Ok(_) => {
                warn!(scene_id = %scene.id, "Aligner returned a non-monotonic timeline, dropping it");
                None
            }
            Err(e) => {
                warn!(scene_id = %scene.id, error = %e, "Alignment failed, persisting without timestamps");
                None
            }
        };

        // Persisting: artifact first, then the scene record. Slot names
        // derive from the scene id, so concurrent scenes never collide.
        let slot = format!("{}/scenes/{}", scene.story_id, scene.id);
        let audio_url = match self.replacer.replace(&slot, audio, "audio/mpeg").await {
            Ok(url) => url,
            Err(e) => {
                warn!(scene_id = %scene.id, error = %e, "Artifact replacement failed");
                return SceneResult::Failed {
                    stage: GenerationStage::Persisting,
                    reason: e.to_string(),
                };
            }
        };

        let update = SceneMediaUpdate {
            audio_url: audio_url.clone(),
            audio_duration: duration,
            voice_id: voice,
            word_timestamps: word_timestamps.clone(),
            generated_at: Utc::now(),
        };
        if let Err(e) = self.scenes.update_scene_media(&scene.id, update).await {
            warn!(scene_id = %scene.id, error = %e, "Scene record update failed");
            return SceneResult::Failed {
                stage: GenerationStage::Persisting,
                reason: e.to_string(),
            };
        }

        SceneResult::Done {
            audio_url,
            duration,
            word_timestamps,
        }
    }

    /// Charge for the scenes that actually completed. A failed settle-up
    /// is logged, not propagated: the generated media exists regardless of
    /// billing, and reconciliation is an out-of-band concern.
    async fn settle_up(
        &self,
        user_id: &str,
        story_id: &str,
        batch_id: &str,
        done_count: u32,
    ) -> i64 {
        if done_count == 0 {
            return 0;
        }

        let amount = done_count as i64 * self.config.unit_cost;
        match self
            .ledger
            .deduct(
                user_id,
                amount,
                LedgerReason::DeductionAudio,
                format!("Audio generation for {} scene(s)", done_count),
                Some(story_id),
                Some(batch_id),
            )
            .await
        {
            Ok(_) => amount,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    story_id = %story_id,
                    batch_id = %batch_id,
                    amount,
                    error = %e,
                    "Settle-up deduction failed; batch result returned anyway"
                );
                0
            }
        }
    }
}
