//! Content-type sniffing for feed files.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Number of leading bytes inspected when classifying a file
pub const SNIFF_LEN: u64 = 8192;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZIP_MAGICS: [&[u8]; 3] = [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];

/// Container format of a feed file, judged from its bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// gzip-compressed stream
    Gzip,
    /// Plain text, including XML/JSON/CSV feeds
    Text,
    /// zip archive
    Zip,
    /// Anything else
    Unsupported,
}

impl ContentType {
    /// MIME type reported for this content
    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Gzip => "application/gzip",
            ContentType::Text => "text/plain",
            ContentType::Zip => "application/zip",
            ContentType::Unsupported => "application/octet-stream",
        }
    }

    /// Whether the decoder can produce lines from this content
    pub fn is_supported(&self) -> bool {
        !matches!(self, ContentType::Unsupported)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentType::Gzip => "gzip",
            ContentType::Text => "text",
            ContentType::Zip => "zip",
            ContentType::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// Classify a buffer holding the leading bytes of a file
pub fn sniff(bytes: &[u8]) -> ContentType {
    if bytes.starts_with(GZIP_MAGIC) {
        return ContentType::Gzip;
    }
    if ZIP_MAGICS.iter().any(|magic| bytes.starts_with(magic)) {
        return ContentType::Zip;
    }
    if looks_like_text(bytes) {
        return ContentType::Text;
    }
    ContentType::Unsupported
}

/// Read the head of `path` and classify it
///
/// Only a missing or unreadable file is an error; unknown content comes back
/// as [`ContentType::Unsupported`].
pub fn detect(path: &Path) -> Result<ContentType> {
    let file = File::open(path)?;
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    file.take(SNIFF_LEN).read_to_end(&mut head)?;

    let content_type = sniff(&head);
    debug!(path = %path.display(), %content_type, mime = content_type.mime(), "sniffed feed content");
    Ok(content_type)
}

fn looks_like_text(bytes: &[u8]) -> bool {
    // UTF-16/32 byte order marks: text, but not in an encoding we decode
    if bytes.starts_with(&[0xff, 0xfe]) || bytes.starts_with(&[0xfe, 0xff]) {
        return false;
    }
    if bytes.contains(&0) {
        return false;
    }

    // Tolerate the odd stray control byte, reject anything mostly binary
    let control = bytes
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b))
        .count();
    control * 10 <= bytes.len()
}
