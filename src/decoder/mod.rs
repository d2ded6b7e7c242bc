//! Streaming line decoder for feed files
//!
//! [`FeedDecoder`] turns a local file into a lazy sequence of text lines,
//! whatever the container: plain text (including XML), gzip, or zip. The
//! container is sniffed from the file's bytes once per [`FeedDecoder::lines`]
//! call and a matching [`Lines`] strategy is selected.
//!
//! gzip and text are streamed from disk. zip members are read one at a time,
//! each fully buffered when first reached, and decoded as UTF-8 with a
//! Latin-1 fallback so that no member fails on encoding alone.
//!
//! # Example
//! ```no_run
//! use feed_archive::decoder::{FeedDecoder, LineOptions};
//!
//! # fn example() -> feed_archive::Result<()> {
//! let decoder = FeedDecoder::open("runtime/cache/example.org/blocklist");
//! for line in decoder.lines(&LineOptions::default())? {
//!     let line = line?;
//!     if line.is_empty() || line.starts_with('#') {
//!         continue;
//!     }
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

mod detect;
mod split;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use detect::{ContentType, SNIFF_LEN, detect, sniff};

use crate::config::DecoderConfig;
use crate::error::{Error, Result};
use flate2::read::MultiGzDecoder;
use split::TokenReader;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const UTF8_BOM: &[u8] = &[0xef, 0xbb, 0xbf];

// Upper bound on the buffer reserved up front for a zip member
const MAX_PREALLOC: u64 = 1 << 20;

/// How lines are produced from a file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineOptions {
    /// Token separating lines (default: "\n")
    pub split_token: String,
    /// Stop after this many lines; 0 = unbounded
    pub limit: usize,
    /// Strip trailing whitespace from every line
    pub rstrip: bool,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            split_token: "\n".to_string(),
            limit: 0,
            rstrip: true,
        }
    }
}

impl From<&DecoderConfig> for LineOptions {
    fn from(config: &DecoderConfig) -> Self {
        Self {
            split_token: config.split_token.clone(),
            limit: config.limit,
            rstrip: config.rstrip,
        }
    }
}

/// A decoder bound to a local feed file
///
/// Opening does no I/O; the file is read when [`lines`](Self::lines) is
/// called, and every call starts again from the beginning of the file.
#[derive(Clone, Debug)]
pub struct FeedDecoder {
    path: PathBuf,
}

impl FeedDecoder {
    /// Bind a decoder to `path` without reading it
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The bound path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sniff the file's container format
    pub fn detect(&self) -> Result<ContentType> {
        detect(&self.path)
    }

    /// Start a lazy pass over the file's lines
    ///
    /// Fails with [`Error::Io`] if the file is missing or unreadable and with
    /// [`Error::UnsupportedFormat`] if its content isn't gzip, zip or text.
    pub fn lines(&self, options: &LineOptions) -> Result<Lines> {
        let content_type = self.detect()?;
        let token = options.split_token.as_bytes();

        let source = match content_type {
            ContentType::Text => {
                let file = File::open(&self.path)?;
                LineSource::Text(TokenReader::new(BufReader::new(file), token))
            }
            ContentType::Gzip => {
                let file = File::open(&self.path)?;
                LineSource::Gzip(TokenReader::new(
                    BufReader::new(MultiGzDecoder::new(file)),
                    token,
                ))
            }
            ContentType::Zip => LineSource::Zip(ZipLines::open(&self.path, token)?),
            ContentType::Unsupported => {
                return Err(Error::UnsupportedFormat {
                    path: self.path.clone(),
                    detected: content_type,
                });
            }
        };

        debug!(
            path = %self.path.display(),
            %content_type,
            limit = options.limit,
            "decoding feed lines"
        );

        Ok(Lines {
            path: self.path.clone(),
            content_type,
            source,
            rstrip: options.rstrip,
            remaining: (options.limit > 0).then_some(options.limit),
            line_number: 0,
        })
    }
}

/// Lazy, single-pass sequence of decoded lines
///
/// Each call to `next` decodes one line; for zip archives the next member is
/// read into memory when the previous one is exhausted. Dropping the
/// iterator abandons the pass.
pub struct Lines {
    path: PathBuf,
    content_type: ContentType,
    source: LineSource,
    rstrip: bool,
    remaining: Option<usize>,
    line_number: u64,
}

enum LineSource {
    Text(TokenReader<BufReader<File>>),
    Gzip(TokenReader<BufReader<MultiGzDecoder<File>>>),
    Zip(ZipLines),
}

impl Lines {
    /// Container format this pass is decoding
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    fn next_line(&mut self) -> Option<Result<String>> {
        let decoded = match &mut self.source {
            LineSource::Text(reader) => reader.next().map(|piece| {
                piece
                    .map_err(Error::from)
                    .and_then(|bytes| decode_utf8(bytes, self.line_number, &self.path))
            }),
            LineSource::Gzip(reader) => reader.next().map(|piece| {
                piece
                    .map_err(Error::from)
                    .and_then(|bytes| decode_utf8(bytes, self.line_number, &self.path))
            }),
            LineSource::Zip(zip) => zip.next(),
        }?;

        self.line_number += 1;
        Some(decoded.map(|line| {
            if self.rstrip {
                trim_end_in_place(line)
            } else {
                line
            }
        }))
    }
}

impl Iterator for Lines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        let item = self.next_line()?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(item)
    }
}

/// Member-at-a-time reader over a zip archive
struct ZipLines {
    path: PathBuf,
    archive: zip::ZipArchive<File>,
    token: Vec<u8>,
    next_member: usize,
    current: Option<ZipMember>,
}

struct ZipMember {
    name: String,
    pieces: TokenReader<Cursor<Vec<u8>>>,
    fallback_logged: bool,
}

impl ZipLines {
    fn open(path: &Path, token: &[u8]) -> Result<Self> {
        let file = File::open(path)?;
        let archive = zip::ZipArchive::new(file).map_err(|e| zip_error(path, e))?;
        debug!(path = %path.display(), members = archive.len(), "opened zip feed");

        Ok(Self {
            path: path.to_path_buf(),
            archive,
            token: token.to_vec(),
            next_member: 0,
            current: None,
        })
    }

    fn next(&mut self) -> Option<Result<String>> {
        loop {
            if let Some(member) = self.current.as_mut() {
                match member.pieces.next() {
                    Some(Ok(bytes)) => return Some(Ok(member.decode(bytes, &self.path))),
                    Some(Err(e)) => return Some(Err(e.into())),
                    None => self.current = None,
                }
            }

            if self.next_member >= self.archive.len() {
                return None;
            }
            let index = self.next_member;
            self.next_member += 1;

            match self.load_member(index) {
                Ok(Some(member)) => self.current = Some(member),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }

    fn load_member(&mut self, index: usize) -> Result<Option<ZipMember>> {
        let mut entry = self
            .archive
            .by_index(index)
            .map_err(|e| zip_error(&self.path, e))?;
        if entry.is_dir() {
            return Ok(None);
        }

        let name = entry.name().to_string();
        // The declared size comes from the archive itself; only trust it as a hint
        let hint = entry.size().min(MAX_PREALLOC);
        let mut content = Vec::with_capacity(usize::try_from(hint).unwrap_or(0));
        entry.read_to_end(&mut content).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!(
                    "failed to read zip member '{}' of {}: {}",
                    name,
                    self.path.display(),
                    e
                ),
            ))
        })?;

        debug!(path = %self.path.display(), member = %name, bytes = content.len(), "buffered zip member");

        Ok(Some(ZipMember {
            name,
            pieces: TokenReader::new(Cursor::new(content), &self.token),
            fallback_logged: false,
        }))
    }
}

impl ZipMember {
    fn decode(&mut self, bytes: Vec<u8>, path: &Path) -> String {
        match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => {
                if !self.fallback_logged {
                    warn!(
                        path = %path.display(),
                        member = %self.name,
                        "zip member is not valid UTF-8, decoding as Latin-1"
                    );
                    self.fallback_logged = true;
                }
                decode_latin1(e.as_bytes())
            }
        }
    }
}

/// Decode ISO-8859-1: every byte maps to the code point of the same value
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn decode_utf8(mut bytes: Vec<u8>, line_number: u64, path: &Path) -> Result<String> {
    if line_number == 0 && bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }
    String::from_utf8(bytes).map_err(|e| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "line {} of {} is not valid UTF-8: {}",
                line_number + 1,
                path.display(),
                e.utf8_error()
            ),
        ))
    })
}

fn trim_end_in_place(mut line: String) -> String {
    let len = line.trim_end().len();
    line.truncate(len);
    line
}

fn zip_error(path: &Path, e: zip::result::ZipError) -> Error {
    match e {
        zip::result::ZipError::Io(io) => Error::Io(io),
        other => Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid zip archive {}: {}", path.display(), other),
        )),
    }
}
