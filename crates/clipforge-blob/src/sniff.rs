//! Content-type detection from leading bytes.
//!
//! The client-declared type is never trusted for processing; the detected
//! type is authoritative downstream.

/// File extensions accepted at upload init.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "webm", "mkv"];

/// Check whether a filename carries an allowed extension.
pub fn extension_allowed(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Detect a media content type from the first bytes of a file.
///
/// Returns `None` when the prefix matches no supported container. At
/// least 12 bytes are needed for a confident ISO-BMFF match.
pub fn detect_content_type(head: &[u8]) -> Option<&'static str> {
    // EBML magic: Matroska and WebM share it; distinguish on the DocType
    // that appears within the first few dozen bytes.
    if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        let scan = &head[..head.len().min(64)];
        if contains(scan, b"webm") {
            return Some("video/webm");
        }
        return Some("video/x-matroska");
    }

    // ISO-BMFF: size (4 bytes) then "ftyp" then the major brand.
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        let brand = &head[8..12];
        if brand.starts_with(b"qt") {
            return Some("video/quicktime");
        }
        return Some("video/mp4");
    }

    None
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check() {
        assert!(extension_allowed("talk.mp4"));
        assert!(extension_allowed("TALK.MOV"));
        assert!(extension_allowed("a.b.webm"));
        assert!(!extension_allowed("notes.txt"));
        assert!(!extension_allowed("noextension"));
    }

    #[test]
    fn detects_mp4() {
        let mut head = vec![0, 0, 0, 24];
        head.extend_from_slice(b"ftypisom");
        head.extend_from_slice(&[0; 8]);
        assert_eq!(detect_content_type(&head), Some("video/mp4"));
    }

    #[test]
    fn detects_quicktime() {
        let mut head = vec![0, 0, 0, 20];
        head.extend_from_slice(b"ftypqt  ");
        head.extend_from_slice(&[0; 8]);
        assert_eq!(detect_content_type(&head), Some("video/quicktime"));
    }

    #[test]
    fn detects_webm_and_matroska() {
        let mut head = vec![0x1A, 0x45, 0xDF, 0xA3];
        head.extend_from_slice(b"\x42\x82\x84webm");
        assert_eq!(detect_content_type(&head), Some("video/webm"));

        let mut mkv = vec![0x1A, 0x45, 0xDF, 0xA3];
        mkv.extend_from_slice(b"\x42\x82\x88matroska");
        assert_eq!(detect_content_type(&mkv), Some("video/x-matroska"));
    }

    #[test]
    fn rejects_unknown() {
        assert_eq!(detect_content_type(b"PK\x03\x04 not a video"), None);
        assert_eq!(detect_content_type(&[]), None);
    }
}
