//! Application state.

use std::sync::Arc;

use fable_media::{AudioProber, FetchLimits, FfprobeProber};
use fable_pipeline::{
    BatchConfig, CreditLedger, FixedWindowLimiter, HttpAligner, HttpSynthesizer, ImportPipeline,
    MediaFetcher, MemoryLedgerStore, MemorySceneRepository, MemoryTrackRepository, RatePolicy,
    SceneBatchOrchestrator, SceneRepository,
};
use fable_storage::{ArtifactReplacer, ObjectStore, R2Client};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub ledger: CreditLedger,
    pub orchestrator: SceneBatchOrchestrator,
    pub import: ImportPipeline,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let storage: Arc<dyn ObjectStore> = Arc::new(R2Client::from_env()?);
        let replacer = ArtifactReplacer::new(storage);

        // Record persistence is deployment-specific; the server defaults to
        // the in-memory implementations behind the repository traits.
        let ledger = CreditLedger::new(Arc::new(MemoryLedgerStore::new()));
        let scenes: Arc<dyn SceneRepository> = Arc::new(MemorySceneRepository::new());
        let tracks = Arc::new(MemoryTrackRepository::new());

        let synthesizer = Arc::new(HttpSynthesizer::new(
            &config.synth_base_url,
            &config.synth_api_key,
        )?);
        let aligner = Arc::new(HttpAligner::new(
            &config.align_base_url,
            &config.align_api_key,
        )?);
        let prober: Arc<dyn AudioProber> = Arc::new(FfprobeProber);

        let orchestrator = SceneBatchOrchestrator::new(
            synthesizer,
            aligner,
            Arc::clone(&prober),
            Arc::clone(&scenes),
            replacer.clone(),
            ledger.clone(),
            BatchConfig::default(),
        );

        let fetcher = Arc::new(MediaFetcher::new(FetchLimits {
            max_bytes: config.import_max_bytes,
        })?);
        let import_policy = RatePolicy::new(
            config.import_rate_max,
            chrono::Duration::from_std(config.import_rate_window)?,
        );
        let import = ImportPipeline::new(
            fetcher,
            prober,
            replacer,
            tracks,
            scenes,
            FixedWindowLimiter::new(),
            import_policy,
        );

        Ok(Self {
            config,
            ledger,
            orchestrator,
            import,
        })
    }
}
