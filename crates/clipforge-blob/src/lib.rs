//! Content-addressed blob storage.
//!
//! This crate provides:
//! - Streaming ingest keyed by SHA-256 digest (write-once, idempotent)
//! - Reference counting shared across jobs
//! - Content-type detection from leading bytes
//! - HMAC-signed delivery URLs for artifacts

pub mod delivery;
pub mod error;
pub mod sniff;
pub mod store;

pub use delivery::{DeliveryConfig, DeliveryScope, DeliveryToken, DeliveryUrlSigner};
pub use error::{BlobError, BlobResult};
pub use sniff::{detect_content_type, extension_allowed, ALLOWED_EXTENSIONS};
pub use store::{BlobConfig, BlobMeta, BlobStore};
