//! Idempotent artifact replacement for a logical media slot.
//!
//! A slot is the stable identity of a replaceable artifact (a scene, a
//! music track). Regenerating writes the new object under a freshly
//! time-stamped name and then deletes every prior variant, so stale and
//! fresh versions are never both reachable and the returned URL is always
//! distinct from previously issued ones (defeats edge/browser caches that
//! key purely on URL path).

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::StorageResult;
use crate::store::ObjectStore;

/// Replaces the stored artifact for a slot.
#[derive(Clone)]
pub struct ArtifactReplacer {
    store: Arc<dyn ObjectStore>,
}

impl ArtifactReplacer {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Write `bytes` as the slot's new artifact and delete all prior
    /// variants.
    ///
    /// The new object is written first: a failed write aborts the update
    /// and leaves the previous artifact in place. Failure to delete stale
    /// variants is logged and non-fatal, since serving the new artifact
    /// must not be blocked by cleanup.
    pub async fn replace(
        &self,
        slot_key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        let slot_prefix = format!("{}/", slot_key.trim_end_matches('/'));
        let new_key = format!(
            "{}{}_{}.{}",
            slot_prefix,
            Utc::now().timestamp_millis(),
            &uuid::Uuid::new_v4().simple().to_string()[..8],
            extension_for(content_type),
        );

        // Write first; the slot must never point at a URL that does not resolve.
        let url = self.store.put(&new_key, bytes, content_type).await?;

        match self.store.list(&slot_prefix).await {
            Ok(objects) => {
                let stale: Vec<String> = objects
                    .into_iter()
                    .map(|o| o.key)
                    .filter(|k| k != &new_key)
                    .collect();

                if !stale.is_empty() {
                    match self.store.delete(&stale).await {
                        Ok(deleted) => {
                            info!(slot = %slot_key, deleted, "Deleted stale artifact variants")
                        }
                        Err(e) => {
                            warn!(slot = %slot_key, error = %e, "Failed to delete stale artifact variants")
                        }
                    }
                }
            }
            Err(e) => {
                warn!(slot = %slot_key, error = %e, "Failed to list slot for stale cleanup")
            }
        }

        Ok(url)
    }

    /// Delete every stored variant of a slot (used when the owning record
    /// is removed).
    pub async fn delete_slot(&self, slot_key: &str) -> StorageResult<u32> {
        let slot_prefix = format!("{}/", slot_key.trim_end_matches('/'));
        let keys: Vec<String> = self
            .store
            .list(&slot_prefix)
            .await?
            .into_iter()
            .map(|o| o.key)
            .collect();

        if keys.is_empty() {
            return Ok(0);
        }
        self.store.delete(&keys).await
    }
}

/// Map a content type to a file extension for the stored key.
fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        "audio/mp4" | "audio/m4a" => "m4a",
        "video/mp4" => "mp4",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        _ => "bin",
    }
}
