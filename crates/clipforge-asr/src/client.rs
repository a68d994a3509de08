//! ASR service HTTP client.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{AsrError, AsrResult};
use crate::types::{HealthResponse, TranscribeResponse};

/// Configuration for the ASR client.
#[derive(Debug, Clone)]
pub struct AsrClientConfig {
    /// Base URL of the ASR service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries on retryable failures
    pub max_retries: u32,
}

impl Default for AsrClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(600), // transcription of long inputs
            max_retries: 2,
        }
    }
}

impl AsrClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ASR_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            timeout: Duration::from_secs(
                std::env::var("ASR_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            max_retries: std::env::var("ASR_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}

/// Client for the external speech recognition service.
#[derive(Clone)]
pub struct AsrClient {
    http: Client,
    config: AsrClientConfig,
}

impl AsrClient {
    /// Create a new ASR client.
    pub fn new(config: AsrClientConfig) -> AsrResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AsrError::Network)?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> AsrResult<Self> {
        Self::new(AsrClientConfig::from_env())
    }

    /// Check if the ASR service is healthy.
    pub async fn health_check(&self) -> AsrResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("ASR health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("ASR health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Transcribe a mono 16 kHz WAV file.
    ///
    /// An empty segment list is a valid result (no speech detected).
    pub async fn transcribe(&self, audio_path: impl AsRef<Path>) -> AsrResult<TranscribeResponse> {
        let audio_path = audio_path.as_ref();
        let bytes = tokio::fs::read(audio_path)
            .await
            .map_err(|e| AsrError::AudioUnreadable(format!("{}: {e}", audio_path.display())))?;

        let url = format!("{}/transcribe", self.config.base_url);
        debug!(url = %url, bytes = bytes.len(), "Sending transcription request");

        self.with_retry(|| {
            let bytes = bytes.clone();
            let url = url.clone();
            async move {
                let part = multipart::Part::bytes(bytes)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(AsrError::Network)?;
                let form = multipart::Form::new().part("audio", part);

                let response = self
                    .http
                    .post(&url)
                    .multipart(form)
                    .send()
                    .await
                    .map_err(AsrError::Network)?;

                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    return Err(AsrError::request_failed(status, body));
                }

                response
                    .json::<TranscribeResponse>()
                    .await
                    .map_err(|e| AsrError::InvalidResponse(e.to_string()))
            }
        })
        .await
    }

    /// Execute with bounded retry on retryable errors.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> AsrResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = AsrResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(250 * 2u64.pow(attempt));
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "ASR request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| AsrError::InvalidResponse("retry loop exhausted".into())))
    }
}
