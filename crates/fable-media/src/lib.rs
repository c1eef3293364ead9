//! External media acquisition for the fable pipeline.
//!
//! Everything here deals with untrusted input: caller-supplied URLs are
//! validated against an SSRF denylist before any outbound request, external
//! downloader tools are invoked with explicit argument vectors only, and
//! every download happens inside a [`TempResourceScope`] so no exit path
//! leaves an orphaned temp file.

pub mod error;
pub mod fetch;
pub mod platform;
pub mod probe;
pub mod temp;

pub use error::{DownloadError, MediaError, MediaResult};
pub use fetch::{FetchLimits, FetchOutcome, SecureFetcher};
pub use platform::PlatformDownloader;
pub use probe::{AudioProber, FfprobeProber};
pub use temp::TempResourceScope;
