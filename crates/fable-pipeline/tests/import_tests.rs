//! Integration tests for the music import pipeline: rate limiting before
//! any download, ownership checks on deletion, and story detachment.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use fable_media::{AudioProber, DownloadError, MediaResult};
use fable_models::{MusicCategory, MusicTrack};
use fable_pipeline::{
    FixedWindowLimiter, ImportPipeline, ImportRequest, ImportSource, MemorySceneRepository,
    MemoryTrackRepository, PipelineError, RatePolicy, ResourceFetcher, TrackRepository,
};
use fable_storage::{ArtifactReplacer, MemoryStore, ObjectStore};

struct CountingFetcher {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingFetcher {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFetcher for CountingFetcher {
    async fn fetch(
        &self,
        _source: &ImportSource,
        destination: &Path,
    ) -> Result<(), DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DownloadError::UpstreamStatus(502));
        }
        tokio::fs::write(destination, b"ID3fake-mp3-bytes").await?;
        Ok(())
    }
}

struct FakeProber;

#[async_trait]
impl AudioProber for FakeProber {
    async fn duration(&self, _path: &Path) -> MediaResult<f64> {
        Ok(42.0)
    }
}

struct Harness {
    pipeline: ImportPipeline,
    fetcher: Arc<CountingFetcher>,
    tracks: Arc<MemoryTrackRepository>,
    scenes: Arc<MemorySceneRepository>,
    store: Arc<MemoryStore>,
}

fn harness(fetcher: CountingFetcher, policy: RatePolicy) -> Harness {
    let fetcher = Arc::new(fetcher);
    let tracks = Arc::new(MemoryTrackRepository::new());
    let scenes = Arc::new(MemorySceneRepository::new());
    let store = Arc::new(MemoryStore::new("test-bucket"));

    let pipeline = ImportPipeline::new(
        Arc::clone(&fetcher) as Arc<dyn ResourceFetcher>,
        Arc::new(FakeProber),
        ArtifactReplacer::new(Arc::clone(&store) as Arc<dyn ObjectStore>),
        Arc::clone(&tracks) as Arc<dyn TrackRepository>,
        Arc::clone(&scenes) as Arc<dyn fable_pipeline::SceneRepository>,
        FixedWindowLimiter::new(),
        policy,
    );

    Harness {
        pipeline,
        fetcher,
        tracks,
        scenes,
        store,
    }
}

fn request(name: &str) -> ImportRequest {
    ImportRequest {
        name: name.to_string(),
        category: MusicCategory::Ambient,
        source: ImportSource::Url("https://cdn.example.com/rain.mp3".to_string()),
    }
}

fn generous_policy() -> RatePolicy {
    RatePolicy::new(10, Duration::hours(1))
}

#[tokio::test]
async fn test_import_creates_track_with_measured_duration() {
    let h = harness(CountingFetcher::new(), generous_policy());

    let track = h.pipeline.import("u1", request("Gentle Rain")).await.unwrap();

    assert_eq!(track.name, "Gentle Rain");
    assert_eq!(track.category, MusicCategory::Ambient);
    assert_eq!(track.duration, 42.0);
    assert_eq!(track.uploaded_by, "u1");
    assert!(!track.is_preset);
    assert!(track.url.starts_with("memory://test-bucket/music/"));

    let stored = h.tracks.get(&track.id).await.unwrap();
    assert!(stored.is_some());
    assert_eq!(h.fetcher.call_count(), 1);
}

#[tokio::test]
async fn test_rate_limited_import_never_downloads() {
    let h = harness(CountingFetcher::new(), RatePolicy::new(1, Duration::hours(1)));

    h.pipeline.import("u1", request("First")).await.unwrap();
    let err = h.pipeline.import("u1", request("Second")).await.unwrap_err();

    assert!(matches!(err, PipelineError::RateLimited { .. }));
    assert_eq!(h.fetcher.call_count(), 1);
}

#[tokio::test]
async fn test_empty_name_rejected_without_download() {
    let h = harness(CountingFetcher::new(), generous_policy());

    let err = h.pipeline.import("u1", request("   ")).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
    assert_eq!(h.fetcher.call_count(), 0);
}

#[tokio::test]
async fn test_failed_download_creates_no_track() {
    let h = harness(CountingFetcher::failing(), generous_policy());

    let err = h.pipeline.import("u1", request("Doomed")).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Download(DownloadError::UpstreamStatus(502))
    ));

    // Nothing persisted anywhere.
    assert!(h.store.list("music/").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_detaches_stories_and_removes_objects() {
    let h = harness(CountingFetcher::new(), generous_policy());

    let track = h.pipeline.import("u1", request("Shared Track")).await.unwrap();
    h.scenes.set_story_music("story-1", &track.url).await;
    h.scenes.set_story_music("story-2", &track.url).await;

    let detached = h.pipeline.delete_track("u1", &track.id).await.unwrap();

    assert_eq!(detached, 2);
    assert_eq!(h.scenes.story_music("story-1").await, None);
    assert!(h.tracks.get(&track.id).await.unwrap().is_none());
    assert!(h
        .store
        .list(&format!("music/{}/", track.id))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_only_uploader_may_delete() {
    let h = harness(CountingFetcher::new(), generous_policy());
    let track = h.pipeline.import("u1", request("Mine")).await.unwrap();

    let err = h.pipeline.delete_track("u2", &track.id).await.unwrap_err();
    assert!(matches!(err, PipelineError::Forbidden(_)));
    assert!(h.tracks.get(&track.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_preset_tracks_cannot_be_deleted() {
    let h = harness(CountingFetcher::new(), generous_policy());

    let mut preset = MusicTrack::new(
        "preset-1",
        "Shipped Lullaby",
        MusicCategory::Calm,
        "https://cdn.example.com/presets/lullaby.mp3",
        60.0,
        "system",
    );
    preset.is_preset = true;
    h.tracks.create(preset).await.unwrap();

    let err = h.pipeline.delete_track("system", "preset-1").await.unwrap_err();
    assert!(matches!(err, PipelineError::Forbidden(_)));
}

#[tokio::test]
async fn test_delete_unknown_track_is_not_found() {
    let h = harness(CountingFetcher::new(), generous_policy());

    let err = h.pipeline.delete_track("u1", "missing").await.unwrap_err();
    assert!(matches!(err, PipelineError::NotFound(_)));
}
