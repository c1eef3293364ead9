//! Secure download of caller-supplied URLs.
//!
//! URLs arrive from end users and drive outbound network fetches, so they
//! are validated against an SSRF denylist before any request is made:
//! loopback, link-local, cloud-metadata and RFC1918 targets are rejected,
//! and redirects are only followed one level deep after re-validating the
//! target against the same rules.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::{Host, Url};

use crate::error::DownloadError;

/// Maximum URL length accepted from callers.
const MAX_URL_LENGTH: usize = 2048;

/// Request timeout for fetches.
const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Hostnames rejected outright.
const BLOCKED_HOSTS: &[&str] = &["0.0.0.0", "169.254.169.254", "metadata.google.internal"];

/// Hostname prefixes rejected outright.
const BLOCKED_HOST_PREFIXES: &[&str] = &["metadata."];

/// Limits applied to a fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    /// Hard byte-size ceiling; crossing it aborts the download and deletes
    /// the partial file.
    pub max_bytes: u64,
}

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Bytes written to the destination path.
    pub bytes_written: u64,
    /// Content type advertised by the server, if any.
    pub content_type: Option<String>,
}

/// Validate a caller-supplied URL for scheme and SSRF safety.
pub fn validate_fetch_url(raw: &str) -> Result<Url, DownloadError> {
    validate_fetch_url_with(raw, false)
}

/// Like [`validate_fetch_url`], with an opt-in loopback allowance used by
/// local test fixtures. Every other denylist rule still applies.
pub fn validate_fetch_url_with(raw: &str, allow_loopback: bool) -> Result<Url, DownloadError> {
    if raw.len() > MAX_URL_LENGTH {
        return Err(DownloadError::InvalidUrl("URL too long".to_string()));
    }

    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DownloadError::InvalidUrl("URL is empty".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| DownloadError::InvalidUrl(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            warn!(url = %raw, scheme = %scheme, "Rejected URL with disallowed scheme");
            return Err(DownloadError::InvalidUrl(format!(
                "Scheme '{}' is not allowed; only http and https are supported",
                scheme
            )));
        }
    }

    let host = url
        .host()
        .ok_or_else(|| DownloadError::InvalidUrl("URL has no host".to_string()))?;

    if is_blocked_host(&host, allow_loopback) {
        warn!(url = %raw, "Rejected URL targeting a blocked host");
        return Err(DownloadError::BlockedHost(host.to_string()));
    }

    Ok(url)
}

/// Check a host against the denylist: loopback, link-local, unspecified,
/// RFC1918 private ranges, unique-local v6 and cloud-metadata names.
fn is_blocked_host(host: &Host<&str>, allow_loopback: bool) -> bool {
    match host {
        Host::Domain(domain) => {
            let domain = domain.to_lowercase();
            if domain == "localhost" {
                return !allow_loopback;
            }
            if BLOCKED_HOSTS.contains(&domain.as_str()) {
                return true;
            }
            if BLOCKED_HOST_PREFIXES.iter().any(|p| domain.starts_with(p)) {
                return true;
            }
            // A domain that parses as an IPv4 literal still gets the IP rules.
            if let Ok(ip) = domain.parse::<Ipv4Addr>() {
                return is_blocked_ipv4(&ip, allow_loopback);
            }
            false
        }
        Host::Ipv4(ip) => is_blocked_ipv4(ip, allow_loopback),
        Host::Ipv6(ip) => is_blocked_ipv6(ip, allow_loopback),
    }
}

fn is_blocked_ipv4(ip: &Ipv4Addr, allow_loopback: bool) -> bool {
    if ip.is_loopback() {
        return !allow_loopback;
    }
    ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn is_blocked_ipv6(ip: &Ipv6Addr, allow_loopback: bool) -> bool {
    if ip.is_loopback() {
        return !allow_loopback;
    }
    // Unspecified, unique-local (fc00::/7) and link-local (fe80::/10).
    ip.is_unspecified()
        || (ip.segments()[0] & 0xfe00) == 0xfc00
        || (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// Downloads validated external URLs under strict size constraints.
#[derive(Clone)]
pub struct SecureFetcher {
    client: Client,
    allow_loopback: bool,
}

impl SecureFetcher {
    /// Create a fetcher with redirects disabled; redirects are handled
    /// manually so each hop can be re-validated.
    pub fn new() -> Result<Self, DownloadError> {
        Self::build(false)
    }

    /// Create a fetcher that additionally accepts loopback targets.
    ///
    /// Only for local fixtures and development; the rest of the denylist
    /// (link-local, metadata, RFC1918) still applies.
    pub fn allowing_loopback() -> Result<Self, DownloadError> {
        Self::build(true)
    }

    fn build(allow_loopback: bool) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| DownloadError::NetworkError(e.to_string()))?;
        Ok(Self {
            client,
            allow_loopback,
        })
    }

    /// Fetch `source` into `destination`, enforcing `limits`.
    ///
    /// Follows at most one redirect after re-validating the `Location`
    /// target. On any failure the partial file is deleted; the caller's
    /// [`crate::TempResourceScope`] removes the directory itself.
    pub async fn fetch(
        &self,
        source: &str,
        destination: impl AsRef<Path>,
        limits: FetchLimits,
    ) -> Result<FetchOutcome, DownloadError> {
        let destination = destination.as_ref();
        let url = validate_fetch_url_with(source, self.allow_loopback)?;

        let mut response = self.get(url.clone()).await?;

        // Follow a single redirect, re-validating the target.
        if response.status().is_redirection() {
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    DownloadError::UpstreamStatus(response.status().as_u16())
                })?;

            let target = url
                .join(location)
                .map_err(|e| DownloadError::InvalidUrl(e.to_string()))?;
            let target = validate_fetch_url_with(target.as_str(), self.allow_loopback)?;
            debug!(from = %url, to = %target, "Following single redirect");

            response = self.get(target).await?;
            if response.status().is_redirection() {
                // One level only; chains are not followed.
                return Err(DownloadError::UpstreamStatus(response.status().as_u16()));
            }
        }

        if !response.status().is_success() {
            return Err(DownloadError::UpstreamStatus(response.status().as_u16()));
        }

        // Early rejection when the server advertises an oversized body.
        if let Some(len) = response.content_length() {
            if len > limits.max_bytes {
                warn!(url = %source, advertised = len, limit = limits.max_bytes, "Rejected oversized download");
                return Err(DownloadError::TooLarge {
                    limit: limits.max_bytes,
                });
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes_written = match self
            .stream_to_file(response, destination, limits.max_bytes)
            .await
        {
            Ok(written) => written,
            Err(e) => {
                // Never leave a partial file behind.
                let _ = tokio::fs::remove_file(destination).await;
                return Err(e);
            }
        };

        // Belt-and-braces: re-check the on-disk size against the ceiling.
        let file_size = tokio::fs::metadata(destination).await?.len();
        if file_size > limits.max_bytes {
            let _ = tokio::fs::remove_file(destination).await;
            warn!(url = %source, size = file_size, limit = limits.max_bytes, "Downloaded file exceeds size limit");
            return Err(DownloadError::TooLarge {
                limit: limits.max_bytes,
            });
        }

        info!(url = %source, bytes = bytes_written, "Fetched external resource");

        Ok(FetchOutcome {
            bytes_written,
            content_type,
        })
    }

    async fn get(&self, url: Url) -> Result<Response, DownloadError> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::NetworkError(e.to_string()))
    }

    async fn stream_to_file(
        &self,
        response: Response,
        destination: &Path,
        max_bytes: u64,
    ) -> Result<u64, DownloadError> {
        let mut file = File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::NetworkError(e.to_string()))?;
            written += chunk.len() as u64;
            if written > max_bytes {
                return Err(DownloadError::TooLarge { limit: max_bytes });
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_schemes() {
        assert!(matches!(
            validate_fetch_url("ftp://example.com/x"),
            Err(DownloadError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_fetch_url("file:///etc/passwd"),
            Err(DownloadError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_rejects_loopback_and_metadata_hosts() {
        for url in [
            "http://127.0.0.1:9999/x",
            "http://localhost/x",
            "http://0.0.0.0/x",
            "http://169.254.169.254/latest/meta-data/",
            "http://[::1]/x",
            "http://metadata.google.internal/computeMetadata/v1/",
        ] {
            assert!(
                matches!(validate_fetch_url(url), Err(DownloadError::BlockedHost(_))),
                "expected {} to be blocked",
                url
            );
        }
    }

    #[test]
    fn test_rejects_private_ranges() {
        for url in [
            "http://10.0.0.5/x",
            "http://172.16.0.1/x",
            "http://172.31.255.1/x",
            "http://192.168.1.1/x",
        ] {
            assert!(
                matches!(validate_fetch_url(url), Err(DownloadError::BlockedHost(_))),
                "expected {} to be blocked",
                url
            );
        }
    }

    #[test]
    fn test_accepts_public_hosts() {
        assert!(validate_fetch_url("https://cdn.example.com/song.mp3").is_ok());
        assert!(validate_fetch_url("http://172.32.0.1/x").is_ok());
        assert!(validate_fetch_url("http://93.184.216.34/x").is_ok());
    }
}
