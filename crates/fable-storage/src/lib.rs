//! Object storage for the fable pipeline.
//!
//! Provides the [`ObjectStore`] abstraction over an R2/S3 bucket (plus an
//! in-memory implementation for tests) and the [`ArtifactReplacer`], which
//! atomically supersedes the stored artifact for a logical media slot.

pub mod client;
pub mod error;
pub mod replace;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use replace::ArtifactReplacer;
pub use store::{MemoryStore, ObjectStore, StoredObject};
