//! Scoped temp paths with guaranteed cleanup.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

/// A scoped temp directory that is removed on every exit path.
///
/// The directory and everything inside it is deleted when the scope is
/// dropped, whether the surrounding operation succeeded, failed validation,
/// hit a network error, or exceeded a size limit. No pipeline operation may
/// leave an orphaned temp file behind.
pub struct TempResourceScope {
    dir: TempDir,
}

impl TempResourceScope {
    /// Create a new scope under the system temp directory.
    pub fn create(prefix: &str) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("fable-{}-", prefix))
            .tempdir()?;
        debug!(path = %dir.path().display(), "Created temp scope");
        Ok(Self { dir })
    }

    /// Path of the scoped directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a named file inside the scope.
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_on_success_path() {
        let path;
        {
            let scope = TempResourceScope::create("test").unwrap();
            path = scope.path().to_path_buf();
            std::fs::write(scope.file_path("audio.mp3"), b"data").unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_cleanup_on_error_path() {
        fn failing_operation(path_out: &mut PathBuf) -> Result<(), &'static str> {
            let scope = TempResourceScope::create("test").map_err(|_| "create")?;
            *path_out = scope.path().to_path_buf();
            std::fs::write(scope.file_path("partial.bin"), b"partial").map_err(|_| "write")?;
            Err("validation failed")
        }

        let mut path = PathBuf::new();
        assert!(failing_operation(&mut path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_cleanup_on_early_return() {
        fn early_return(flag: bool, path_out: &mut PathBuf) -> Option<()> {
            let scope = TempResourceScope::create("test").ok()?;
            *path_out = scope.path().to_path_buf();
            if flag {
                return None;
            }
            Some(())
        }

        let mut path = PathBuf::new();
        assert!(early_return(true, &mut path).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_cleanup_on_panic() {
        let path = std::sync::Arc::new(std::sync::Mutex::new(PathBuf::new()));
        let path_clone = std::sync::Arc::clone(&path);

        let result = std::panic::catch_unwind(move || {
            let scope = TempResourceScope::create("test").unwrap();
            *path_clone.lock().unwrap() = scope.path().to_path_buf();
            panic!("mid-operation panic");
        });

        assert!(result.is_err());
        assert!(!path.lock().unwrap().exists());
    }
}
