//! API configuration.

use std::time::Duration;

/// Default ceiling for a single imported resource (50 MB).
const DEFAULT_IMPORT_MAX_BYTES: u64 = 50 * 1024 * 1024;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Ambient per-IP rate limit, requests per second
    pub rate_limit_rps: u32,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// HS256 secret for API tokens
    pub jwt_secret: String,
    /// Synthesis engine base URL
    pub synth_base_url: String,
    /// Synthesis engine API key
    pub synth_api_key: String,
    /// Alignment engine base URL
    pub align_base_url: String,
    /// Alignment engine API key
    pub align_api_key: String,
    /// Byte ceiling for a single music import
    pub import_max_bytes: u64,
    /// Music imports allowed per identity per window
    pub import_rate_max: u32,
    /// Music import rate window
    pub import_rate_window: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            max_body_size: 1024 * 1024, // 1MB, bodies here are JSON only
            environment: "development".to_string(),
            jwt_secret: String::new(),
            synth_base_url: "http://localhost:9100".to_string(),
            synth_api_key: String::new(),
            align_base_url: "http://localhost:9200".to_string(),
            align_api_key: String::new(),
            import_max_bytes: DEFAULT_IMPORT_MAX_BYTES,
            import_rate_max: 10,
            import_rate_window: Duration::from_secs(3600),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_default(),
            synth_base_url: std::env::var("SYNTH_BASE_URL").unwrap_or(defaults.synth_base_url),
            synth_api_key: std::env::var("SYNTH_API_KEY").unwrap_or_default(),
            align_base_url: std::env::var("ALIGN_BASE_URL").unwrap_or(defaults.align_base_url),
            align_api_key: std::env::var("ALIGN_API_KEY").unwrap_or_default(),
            import_max_bytes: std::env::var("IMPORT_MAX_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.import_max_bytes),
            import_rate_max: std::env::var("IMPORT_RATE_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.import_rate_max),
            import_rate_window: Duration::from_secs(
                std::env::var("IMPORT_RATE_WINDOW_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.import_rate_window.as_secs()),
            ),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}
