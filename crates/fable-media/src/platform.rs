//! Sandboxed download of named-platform video references.
//!
//! References are user-influenced, so they are matched against a strict
//! allow-pattern before any invocation, and the downloader tool is always
//! run with an explicit argument vector — never a concatenated shell
//! string — so a hostile reference cannot inject flags or commands.

use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::DownloadError;

/// Allow-pattern for platform video references (YouTube video ids).
static REFERENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

/// Primary downloader tool.
const PRIMARY_TOOL: &str = "yt-dlp";

/// Fallback tool tried once when the primary fails.
const FALLBACK_TOOL: &str = "youtube-dl";

/// Downloads audio for a platform video reference via an external tool.
#[derive(Debug, Clone)]
pub struct PlatformDownloader {
    /// Hard size ceiling passed to the tool as a flag.
    max_bytes: u64,
}

impl PlatformDownloader {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Validate a reference against the allow-pattern.
    pub fn validate_reference(reference: &str) -> Result<&str, DownloadError> {
        if REFERENCE_PATTERN.is_match(reference) {
            Ok(reference)
        } else {
            warn!(reference = %reference, "Rejected malformed platform reference");
            Err(DownloadError::InvalidUrl(
                "Platform reference must be an 11-character video id".to_string(),
            ))
        }
    }

    /// Download the reference's audio to `output_path`.
    ///
    /// Tries the primary tool, then the fallback once. Tool output is
    /// logged server-side only; both tools failing surfaces as a single
    /// `ToolFailure`.
    pub async fn download(
        &self,
        reference: &str,
        output_path: impl AsRef<Path>,
    ) -> Result<(), DownloadError> {
        let reference = Self::validate_reference(reference)?;
        let output_path = output_path.as_ref();

        match self.run_tool(PRIMARY_TOOL, reference, output_path).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(
                    tool = PRIMARY_TOOL,
                    reference = %reference,
                    error = %e,
                    "Primary downloader failed, trying fallback"
                );
            }
        }

        self.run_tool(FALLBACK_TOOL, reference, output_path)
            .await
            .map_err(|_| {
                DownloadError::ToolFailure(
                    "Could not download the requested video".to_string(),
                )
            })
    }

    async fn run_tool(
        &self,
        tool: &str,
        reference: &str,
        output_path: &Path,
    ) -> Result<(), DownloadError> {
        which::which(tool)
            .map_err(|_| DownloadError::ToolFailure(format!("{} not found in PATH", tool)))?;

        // The reference has passed the allow-pattern, so it cannot carry
        // flags; the URL is constructed here, never taken verbatim.
        let url = format!("https://www.youtube.com/watch?v={}", reference);
        let max_filesize = self.max_bytes.to_string();
        let output = output_path.to_string_lossy().to_string();

        let args: Vec<&str> = vec![
            "--no-playlist",
            "--max-filesize",
            &max_filesize,
            "-f",
            "bestaudio[ext=m4a]/bestaudio/best",
            "-o",
            &output,
            &url,
        ];

        debug!(tool = %tool, reference = %reference, "Invoking platform downloader");

        let result = Command::new(tool)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            // Tool diagnostics stay server-side.
            debug!(tool = %tool, stderr = %stderr, "Downloader tool failed");
            return Err(DownloadError::ToolFailure(format!(
                "{} exited with {}",
                tool, result.status
            )));
        }

        if !output_path.exists() {
            return Err(DownloadError::ToolFailure(
                "Downloader produced no output file".to_string(),
            ));
        }

        let size = output_path.metadata()?.len();
        if size > self.max_bytes {
            // --max-filesize is advisory for some formats; enforce it here.
            let _ = tokio::fs::remove_file(output_path).await;
            return Err(DownloadError::TooLarge {
                limit: self.max_bytes,
            });
        }

        info!(
            tool = %tool,
            reference = %reference,
            size_bytes = size,
            "Downloaded platform audio"
        );

        Ok(())
    }
}
