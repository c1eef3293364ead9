//! Music import and deletion.
//!
//! Import acquires a single external resource (direct URL or platform
//! reference), measures it, persists it through the replace-then-delete
//! slot discipline, and records a track row. The rate-limit check runs
//! before anything else: a denied request performs no download and leaves
//! no trace beyond the limiter's own state.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use fable_media::{
    AudioProber, DownloadError, FetchLimits, PlatformDownloader, SecureFetcher, TempResourceScope,
};
use fable_models::{MusicCategory, MusicTrack};
use fable_storage::ArtifactReplacer;

use crate::error::{PipelineError, PipelineResult};
use crate::rate_limit::{FixedWindowLimiter, OperationClass, RatePolicy};
use crate::repos::{SceneRepository, TrackRepository};

/// Longest accepted track display name.
const MAX_TRACK_NAME_LEN: usize = 100;

/// Where an imported track comes from.
#[derive(Debug, Clone)]
pub enum ImportSource {
    /// Direct HTTP(S) URL to an audio file.
    Url(String),
    /// Video-platform reference (11-character video id).
    PlatformRef(String),
}

/// A validated-on-entry import request.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub name: String,
    pub category: MusicCategory,
    pub source: ImportSource,
}

/// Acquires an import source onto a local path.
///
/// Seam between the pipeline and the concrete downloaders so tests can
/// observe whether a download was attempted at all.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, source: &ImportSource, destination: &Path)
        -> Result<(), DownloadError>;
}

/// Production fetcher: denylist-validated HTTP for URLs, the external
/// downloader tool for platform references.
pub struct MediaFetcher {
    fetcher: SecureFetcher,
    platform: PlatformDownloader,
    limits: FetchLimits,
}

impl MediaFetcher {
    pub fn new(limits: FetchLimits) -> Result<Self, DownloadError> {
        Ok(Self {
            fetcher: SecureFetcher::new()?,
            platform: PlatformDownloader::new(limits.max_bytes),
            limits,
        })
    }
}

#[async_trait]
impl ResourceFetcher for MediaFetcher {
    async fn fetch(
        &self,
        source: &ImportSource,
        destination: &Path,
    ) -> Result<(), DownloadError> {
        match source {
            ImportSource::Url(url) => {
                self.fetcher.fetch(url, destination, self.limits).await?;
                Ok(())
            }
            ImportSource::PlatformRef(reference) => {
                self.platform.download(reference, destination).await
            }
        }
    }
}

/// End-to-end music import and deletion.
#[derive(Clone)]
pub struct ImportPipeline {
    fetcher: Arc<dyn ResourceFetcher>,
    prober: Arc<dyn AudioProber>,
    replacer: ArtifactReplacer,
    tracks: Arc<dyn TrackRepository>,
    scenes: Arc<dyn SceneRepository>,
    limiter: FixedWindowLimiter,
    policy: RatePolicy,
}

impl ImportPipeline {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        prober: Arc<dyn AudioProber>,
        replacer: ArtifactReplacer,
        tracks: Arc<dyn TrackRepository>,
        scenes: Arc<dyn SceneRepository>,
        limiter: FixedWindowLimiter,
        policy: RatePolicy,
    ) -> Self {
        Self {
            fetcher,
            prober,
            replacer,
            tracks,
            scenes,
            limiter,
            policy,
        }
    }

    /// Import one track for `user_id`.
    ///
    /// Order matters: the rate-limit check precedes validation and the
    /// download, so a denied request costs nothing downstream.
    pub async fn import(
        &self,
        user_id: &str,
        request: ImportRequest,
    ) -> PipelineResult<MusicTrack> {
        let decision = self
            .limiter
            .check(user_id, OperationClass::MusicImport, self.policy)
            .await;
        if !decision.allowed {
            warn!(user_id = %user_id, reset_time = %decision.reset_time, "Music import rate limited");
            return Err(PipelineError::RateLimited {
                reset_time: decision.reset_time,
            });
        }

        let name = request.name.trim();
        if name.is_empty() {
            return Err(PipelineError::validation("Track name must not be empty"));
        }
        if name.len() > MAX_TRACK_NAME_LEN {
            return Err(PipelineError::validation(format!(
                "Track name must be at most {} characters",
                MAX_TRACK_NAME_LEN
            )));
        }

        let track_id = Uuid::new_v4().to_string();
        info!(user_id = %user_id, track_id = %track_id, name = %name, "Importing music track");

        // The scope owns every intermediate file; any exit path below
        // leaves nothing behind.
        let scope = TempResourceScope::create("music-import")
            .map_err(|e| PipelineError::internal(format!("Failed to create temp scope: {}", e)))?;
        let local_path = scope.file_path("track.mp3");

        self.fetcher.fetch(&request.source, &local_path).await?;

        let duration = self.prober.duration(&local_path).await?;

        let bytes = tokio::fs::read(&local_path)
            .await
            .map_err(|e| PipelineError::internal(format!("Failed to read staged track: {}", e)))?;
        let slot = format!("music/{}", track_id);
        let url = self.replacer.replace(&slot, bytes, "audio/mpeg").await?;

        let track = MusicTrack::new(&track_id, name, request.category, url, duration, user_id);
        self.tracks.create(track.clone()).await?;

        info!(track_id = %track_id, duration, "Music track imported");
        Ok(track)
    }

    /// Delete a non-preset track owned by `user_id`.
    ///
    /// Storage objects go first, then every referencing story is detached,
    /// and the row is removed last so a failure partway never leaves a
    /// story pointing at a missing track.
    pub async fn delete_track(&self, user_id: &str, track_id: &str) -> PipelineResult<u32> {
        let track = self
            .tracks
            .get(track_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("Track {}", track_id)))?;

        if track.is_preset {
            return Err(PipelineError::Forbidden(
                "Preset tracks cannot be deleted".to_string(),
            ));
        }
        if !track.deletable_by(user_id) {
            return Err(PipelineError::Forbidden(
                "Only the uploader may delete this track".to_string(),
            ));
        }

        let slot = format!("music/{}", track_id);
        let removed = self.replacer.delete_slot(&slot).await?;

        let detached = self.scenes.detach_music(&track.url).await?;
        self.tracks.delete(track_id).await?;

        info!(
            user_id = %user_id,
            track_id = %track_id,
            objects_removed = removed,
            stories_detached = detached,
            "Music track deleted"
        );
        Ok(detached)
    }
}
