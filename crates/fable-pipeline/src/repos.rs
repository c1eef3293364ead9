//! Relational-store collaborator interfaces.
//!
//! The relational store itself is external; the pipeline only needs
//! ordered scene scans, atomic single-scene media updates, and music
//! track CRUD with story detachment. In-memory implementations back the
//! tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use fable_models::{MusicTrack, Scene, VoiceId, WordTimestamp};

use crate::error::{PipelineError, PipelineResult};

/// Media fields written back to a scene after generation.
#[derive(Debug, Clone)]
pub struct SceneMediaUpdate {
    pub audio_url: String,
    pub audio_duration: f64,
    pub voice_id: VoiceId,
    pub word_timestamps: Option<Vec<WordTimestamp>>,
    pub generated_at: DateTime<Utc>,
}

/// Scene persistence interface.
#[async_trait]
pub trait SceneRepository: Send + Sync {
    /// All scenes of a story, ordered by ordinal position.
    async fn scenes_for_story(&self, story_id: &str) -> PipelineResult<Vec<Scene>>;

    /// Atomically update one scene's media fields.
    async fn update_scene_media(
        &self,
        scene_id: &str,
        update: SceneMediaUpdate,
    ) -> PipelineResult<()>;

    /// Null the music reference of every story pointing at `track_url`.
    /// Returns the number of stories detached.
    async fn detach_music(&self, track_url: &str) -> PipelineResult<u32>;
}

/// Music track persistence interface.
#[async_trait]
pub trait TrackRepository: Send + Sync {
    async fn create(&self, track: MusicTrack) -> PipelineResult<()>;

    async fn get(&self, track_id: &str) -> PipelineResult<Option<MusicTrack>>;

    async fn delete(&self, track_id: &str) -> PipelineResult<()>;
}

/// In-memory scene repository.
#[derive(Clone, Default)]
pub struct MemorySceneRepository {
    scenes: Arc<RwLock<Vec<Scene>>>,
    /// story_id -> music track URL, for detachment tests.
    story_music: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySceneRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, scene: Scene) {
        self.scenes.write().await.push(scene);
    }

    pub async fn get(&self, scene_id: &str) -> Option<Scene> {
        self.scenes
            .read()
            .await
            .iter()
            .find(|s| s.id == scene_id)
            .cloned()
    }

    pub async fn set_story_music(&self, story_id: &str, track_url: &str) {
        self.story_music
            .write()
            .await
            .insert(story_id.to_string(), track_url.to_string());
    }

    pub async fn story_music(&self, story_id: &str) -> Option<String> {
        self.story_music.read().await.get(story_id).cloned()
    }
}

#[async_trait]
impl SceneRepository for MemorySceneRepository {
    async fn scenes_for_story(&self, story_id: &str) -> PipelineResult<Vec<Scene>> {
        let mut scenes: Vec<Scene> = self
            .scenes
            .read()
            .await
            .iter()
            .filter(|s| s.story_id == story_id)
            .cloned()
            .collect();
        scenes.sort_by_key(|s| s.position);
        Ok(scenes)
    }

    async fn update_scene_media(
        &self,
        scene_id: &str,
        update: SceneMediaUpdate,
    ) -> PipelineResult<()> {
        let mut scenes = self.scenes.write().await;
        let scene = scenes
            .iter_mut()
            .find(|s| s.id == scene_id)
            .ok_or_else(|| PipelineError::NotFound(format!("Scene {}", scene_id)))?;

        scene.audio_url = Some(update.audio_url);
        scene.audio_duration = Some(update.audio_duration);
        scene.voice_id = Some(update.voice_id);
        scene.word_timestamps = update.word_timestamps;
        scene.generated_at = Some(update.generated_at);
        Ok(())
    }

    async fn detach_music(&self, track_url: &str) -> PipelineResult<u32> {
        let mut story_music = self.story_music.write().await;
        let before = story_music.len();
        story_music.retain(|_, url| url != track_url);
        Ok((before - story_music.len()) as u32)
    }
}

/// In-memory music track repository.
#[derive(Clone, Default)]
pub struct MemoryTrackRepository {
    tracks: Arc<RwLock<HashMap<String, MusicTrack>>>,
}

impl MemoryTrackRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrackRepository for MemoryTrackRepository {
    async fn create(&self, track: MusicTrack) -> PipelineResult<()> {
        self.tracks.write().await.insert(track.id.clone(), track);
        Ok(())
    }

    async fn get(&self, track_id: &str) -> PipelineResult<Option<MusicTrack>> {
        Ok(self.tracks.read().await.get(track_id).cloned())
    }

    async fn delete(&self, track_id: &str) -> PipelineResult<()> {
        self.tracks.write().await.remove(track_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scenes_returned_in_ordinal_order() {
        let repo = MemorySceneRepository::new();
        repo.insert(Scene::new("c", "s1", 2, "third")).await;
        repo.insert(Scene::new("a", "s1", 0, "first")).await;
        repo.insert(Scene::new("b", "s1", 1, "second")).await;
        repo.insert(Scene::new("x", "s2", 0, "other story")).await;

        let scenes = repo.scenes_for_story("s1").await.unwrap();
        let positions: Vec<u32> = scenes.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_detach_music_counts_stories() {
        let repo = MemorySceneRepository::new();
        repo.set_story_music("s1", "https://cdn/m1.mp3").await;
        repo.set_story_music("s2", "https://cdn/m1.mp3").await;
        repo.set_story_music("s3", "https://cdn/other.mp3").await;

        let detached = repo.detach_music("https://cdn/m1.mp3").await.unwrap();
        assert_eq!(detached, 2);
        assert_eq!(repo.story_music("s1").await, None);
        assert!(repo.story_music("s3").await.is_some());
    }
}
