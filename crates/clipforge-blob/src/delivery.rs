//! Signed artifact delivery URLs.
//!
//! Artifact fetches go through an opaque, expiring, HMAC-signed token so
//! that URLs can be handed to clients without exposing blob ids or
//! requiring re-authentication at the CDN edge.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{BlobError, BlobResult};

type HmacSha256 = Hmac<Sha256>;

/// Default expiry for playback URLs (15 minutes).
pub const DEFAULT_PLAYBACK_EXPIRY_SECS: u64 = 900;

/// Default expiry for download URLs (5 minutes).
pub const DEFAULT_DOWNLOAD_EXPIRY_SECS: u64 = 300;

/// Maximum allowed expiry (7 days) to prevent long-lived URL leakage.
pub const MAX_EXPIRY_SECS: u64 = 604_800;

/// Delivery configuration.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Secret key for HMAC signing
    pub signing_secret: String,
    /// Public base URL the API serves artifacts from
    pub base_url: String,
    /// Default playback URL expiry
    pub playback_expiry: Duration,
    /// Default download URL expiry
    pub download_expiry: Duration,
}

impl DeliveryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            signing_secret: std::env::var("DELIVERY_SIGNING_SECRET")
                .unwrap_or_else(|_| "dev-only-delivery-secret".to_string()),
            base_url: std::env::var("DELIVERY_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            playback_expiry: Duration::from_secs(
                std::env::var("PLAYBACK_URL_EXPIRY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_PLAYBACK_EXPIRY_SECS)
                    .min(MAX_EXPIRY_SECS),
            ),
            download_expiry: Duration::from_secs(
                std::env::var("DOWNLOAD_URL_EXPIRY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DOWNLOAD_EXPIRY_SECS)
                    .min(MAX_EXPIRY_SECS),
            ),
        }
    }
}

/// Scope of the delivery URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryScope {
    /// Playback only (streaming in a video player)
    Playback,
    /// Download with Content-Disposition: attachment
    Download,
}

impl DeliveryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryScope::Playback => "play",
            DeliveryScope::Download => "dl",
        }
    }
}

/// HMAC-signed token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryToken {
    /// Artifact id
    pub aid: String,
    /// Owning principal
    pub uid: String,
    /// Scope (play/dl)
    pub scope: String,
    /// Expiry timestamp (Unix seconds)
    pub exp: i64,
}

impl DeliveryToken {
    pub fn is_expired(&self) -> bool {
        self.exp < Utc::now().timestamp()
    }
}

/// Signs and verifies delivery tokens.
#[derive(Clone)]
pub struct DeliveryUrlSigner {
    config: DeliveryConfig,
}

impl DeliveryUrlSigner {
    pub fn new(config: DeliveryConfig) -> Self {
        Self { config }
    }

    /// Produce a signed URL for an artifact.
    pub fn signed_url(
        &self,
        artifact_id: &str,
        principal_id: &str,
        scope: DeliveryScope,
    ) -> BlobResult<String> {
        let expiry = match scope {
            DeliveryScope::Playback => self.config.playback_expiry,
            DeliveryScope::Download => self.config.download_expiry,
        };
        let token = DeliveryToken {
            aid: artifact_id.to_string(),
            uid: principal_id.to_string(),
            scope: scope.as_str().to_string(),
            exp: Utc::now().timestamp() + expiry.as_secs() as i64,
        };
        let encoded = self.encode(&token)?;
        Ok(format!(
            "{}/artifacts/{}/file?token={}",
            self.config.base_url.trim_end_matches('/'),
            artifact_id,
            encoded
        ))
    }

    /// Encode and sign a token: `base64(json) . base64(hmac)`.
    pub fn encode(&self, token: &DeliveryToken) -> BlobResult<String> {
        let payload = serde_json::to_vec(token)?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);
        let sig = self.sign(payload_b64.as_bytes())?;
        Ok(format!("{}.{}", payload_b64, URL_SAFE_NO_PAD.encode(sig)))
    }

    /// Verify signature and expiry; returns the token on success.
    pub fn decode(&self, encoded: &str) -> BlobResult<DeliveryToken> {
        let (payload_b64, sig_b64) = encoded
            .split_once('.')
            .ok_or_else(|| BlobError::SigningFailed("malformed token".to_string()))?;

        let presented = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| BlobError::SigningFailed("malformed signature".to_string()))?;

        // Constant-time comparison via the Mac verify API
        let mut mac = HmacSha256::new_from_slice(self.config.signing_secret.as_bytes())
            .map_err(|e| BlobError::SigningFailed(e.to_string()))?;
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&presented)
            .map_err(|_| BlobError::SigningFailed("signature mismatch".to_string()))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| BlobError::SigningFailed("malformed payload".to_string()))?;
        let token: DeliveryToken = serde_json::from_slice(&payload)?;

        if token.is_expired() {
            return Err(BlobError::SigningFailed("token expired".to_string()));
        }
        Ok(token)
    }

    fn sign(&self, data: &[u8]) -> BlobResult<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(self.config.signing_secret.as_bytes())
            .map_err(|e| BlobError::SigningFailed(e.to_string()))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> DeliveryUrlSigner {
        DeliveryUrlSigner::new(DeliveryConfig {
            signing_secret: "test-secret".to_string(),
            base_url: "http://localhost:8000".to_string(),
            playback_expiry: Duration::from_secs(900),
            download_expiry: Duration::from_secs(300),
        })
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let s = signer();
        let url = s
            .signed_url("art-1", "user-1", DeliveryScope::Playback)
            .unwrap();
        let token_part = url.split("token=").nth(1).unwrap();
        let token = s.decode(token_part).unwrap();
        assert_eq!(token.aid, "art-1");
        assert_eq!(token.uid, "user-1");
        assert_eq!(token.scope, "play");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let s = signer();
        let url = s
            .signed_url("art-1", "user-1", DeliveryScope::Download)
            .unwrap();
        let token_part = url.split("token=").nth(1).unwrap();
        let mut tampered = token_part.to_string();
        tampered.replace_range(0..1, "X");
        assert!(s.decode(&tampered).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let s = signer();
        let token = DeliveryToken {
            aid: "a".into(),
            uid: "u".into(),
            scope: "play".into(),
            exp: Utc::now().timestamp() - 10,
        };
        let encoded = s.encode(&token).unwrap();
        assert!(s.decode(&encoded).is_err());
    }
}
