//! Resumable upload sessions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{PrincipalId, UploadId};

/// One bit per chunk, monotonically accruing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChunkBitmap {
    /// Packed bits, little-endian within each byte
    bits: Vec<u8>,
    /// Number of valid bits
    len: u32,
}

impl ChunkBitmap {
    pub fn new(len: u32) -> Self {
        Self {
            bits: vec![0; len.div_ceil(8) as usize],
            len,
        }
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: u32) -> bool {
        if index >= self.len {
            return false;
        }
        self.bits[(index / 8) as usize] & (1 << (index % 8)) != 0
    }

    /// Set a bit. Out-of-range indices are the caller's bug; this only
    /// ever widens the received set.
    pub fn set(&mut self, index: u32) {
        debug_assert!(index < self.len);
        self.bits[(index / 8) as usize] |= 1 << (index % 8);
    }

    pub fn count_set(&self) -> u32 {
        self.bits.iter().map(|b| b.count_ones()).sum()
    }

    pub fn all_set(&self) -> bool {
        self.count_set() == self.len
    }

    pub fn missing_indices(&self) -> Vec<u32> {
        (0..self.len).filter(|&i| !self.get(i)).collect()
    }
}

/// A chunked resumable upload in progress.
///
/// Created by `init`, mutated only by chunk writes from the owning
/// principal, terminal on `complete` (promotes to a blob) or expiry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadSession {
    /// Opaque session id
    pub id: UploadId,
    /// Owning principal
    pub principal_id: PrincipalId,
    /// Declared filename (extension validated at init)
    pub filename: String,
    /// Declared total size in bytes
    pub size: u64,
    /// Declared content type; used for quota accounting only, the
    /// detected type is authoritative downstream
    pub declared_type: String,
    /// Chunk size in bytes
    pub chunk_size: u32,
    /// Total number of chunks, `ceil(size / chunk_size)`
    pub total_chunks: u32,
    /// Received-chunk bitmap
    pub received: ChunkBitmap,
    /// Session expiry
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn new(
        principal_id: PrincipalId,
        filename: impl Into<String>,
        size: u64,
        declared_type: impl Into<String>,
        chunk_size: u32,
        ttl: chrono::Duration,
    ) -> Self {
        let total_chunks = size.div_ceil(chunk_size as u64) as u32;
        let now = Utc::now();
        Self {
            id: UploadId::new(),
            principal_id,
            filename: filename.into(),
            size,
            declared_type: declared_type.into(),
            chunk_size,
            total_chunks,
            received: ChunkBitmap::new(total_chunks),
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Expected byte length of the chunk at `index`.
    ///
    /// Every chunk is exactly `chunk_size` except the last, which carries
    /// the remainder (or a full chunk when size divides evenly).
    pub fn expected_chunk_len(&self, index: u32) -> u64 {
        if index + 1 == self.total_chunks {
            let rem = self.size % self.chunk_size as u64;
            if rem == 0 {
                self.chunk_size as u64
            } else {
                rem
            }
        } else {
            self.chunk_size as u64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.received.all_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(size: u64, chunk: u32) -> UploadSession {
        UploadSession::new(
            PrincipalId::from("user-1"),
            "talk.mp4",
            size,
            "video/mp4",
            chunk,
            chrono::Duration::hours(24),
        )
    }

    #[test]
    fn bitmap_accrues() {
        let mut b = ChunkBitmap::new(10);
        assert_eq!(b.count_set(), 0);
        b.set(0);
        b.set(9);
        b.set(9);
        assert_eq!(b.count_set(), 2);
        assert!(b.get(9));
        assert!(!b.get(5));
        assert_eq!(b.missing_indices().len(), 8);
    }

    #[test]
    fn total_chunks_rounds_up() {
        let s = session(10 * 1024 * 1024 + 1, 1024 * 1024);
        assert_eq!(s.total_chunks, 11);
        assert_eq!(s.expected_chunk_len(0), 1024 * 1024);
        assert_eq!(s.expected_chunk_len(10), 1);
    }

    #[test]
    fn exact_multiple_last_chunk_is_full() {
        let s = session(8 * 1024 * 1024, 1024 * 1024);
        assert_eq!(s.total_chunks, 8);
        assert_eq!(s.expected_chunk_len(7), 1024 * 1024);
    }

    #[test]
    fn completeness() {
        let mut s = session(3, 1);
        assert!(!s.is_complete());
        for i in 0..3 {
            s.received.set(i);
        }
        assert!(s.is_complete());
    }
}
