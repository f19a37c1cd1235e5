//! Content-type classification by signature.

/// Number of leading bytes inspected by [`SignatureClassifier`].
pub const SNIFF_LEN: usize = 512;

/// MIME type reported when nothing else matches.
const OCTET_STREAM: &str = "application/octet-stream";

/// Derives a MIME type from raw content.
pub trait ContentClassifier: Send + Sync {
    /// Classify `content`. Never fails; unknown content yields a generic type.
    fn classify(&self, content: &[u8]) -> String;
}

/// Magic-number classifier over the first [`SNIFF_LEN`] bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureClassifier;

/// Prefix signatures, checked in order.
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"\x89PNG\r\n\x1A\n", "image/png"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"BM", "image/bmp"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"II*\x00", "image/tiff"),
    (b"MM\x00*", "image/tiff"),
    (b"%PDF-", "application/pdf"),
];

impl SignatureClassifier {
    fn is_webp(head: &[u8]) -> bool {
        head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP"
    }

    fn is_text(head: &[u8]) -> bool {
        !head
            .iter()
            .any(|&b| matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F))
    }
}

impl ContentClassifier for SignatureClassifier {
    fn classify(&self, content: &[u8]) -> String {
        let head = &content[..content.len().min(SNIFF_LEN)];

        if let Some((_, mime)) = SIGNATURES.iter().find(|(sig, _)| head.starts_with(sig)) {
            return (*mime).to_string();
        }
        if Self::is_webp(head) {
            return "image/webp".to_string();
        }
        if !head.is_empty() && Self::is_text(head) {
            return "text/plain; charset=utf-8".to_string();
        }
        OCTET_STREAM.to_string()
    }
}
