//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second, per principal
    pub rate_limit_rps: u32,
    /// Rate limit burst
    pub rate_limit_burst: u32,
    /// Max accepted upload size in bytes
    pub max_upload_bytes: u64,
    /// Upload session TTL
    pub upload_ttl: Duration,
    /// Default chunk size for upload sessions
    pub upload_chunk_bytes: u32,
    /// Staging directory for upload chunks
    pub upload_staging_dir: PathBuf,
    /// Environment (development/production)
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            rate_limit_burst: 20,
            max_upload_bytes: 500 * 1024 * 1024,
            upload_ttl: Duration::from_secs(24 * 3600),
            upload_chunk_bytes: 1024 * 1024,
            upload_staging_dir: PathBuf::from("./data/uploads"),
            environment: "development".to_string(),
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
            rate_limit_burst: std::env::var("RATE_LIMIT_BURST")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_burst),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),
            upload_ttl: Duration::from_secs(
                std::env::var("UPLOAD_TTL_HOURS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(|h| h * 3600)
                    .unwrap_or(24 * 3600),
            ),
            upload_chunk_bytes: std::env::var("UPLOAD_CHUNK_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.upload_chunk_bytes),
            upload_staging_dir: std::env::var("CLIPFORGE_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_staging_dir),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}
