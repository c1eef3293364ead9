//! FFprobe audio duration measurement.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// Measures the duration of an audio file.
///
/// A trait seam so the pipeline can be tested without ffmpeg installed.
#[async_trait]
pub trait AudioProber: Send + Sync {
    /// Duration of the audio at `path`, in seconds.
    async fn duration(&self, path: &Path) -> MediaResult<f64>;
}

/// FFprobe JSON output format (format section only).
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// `ffprobe`-backed prober.
#[derive(Debug, Clone, Default)]
pub struct FfprobeProber;

#[async_trait]
impl AudioProber for FfprobeProber {
    async fn duration(&self, path: &Path) -> MediaResult<f64> {
        probe_audio_duration(path).await
    }
}

/// Probe an audio file for its duration using ffprobe.
pub async fn probe_audio_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;

    probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| MediaError::InvalidAudio("No duration reported".to_string()))
}
