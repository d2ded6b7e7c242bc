//! Feed fixtures and helpers for writing them in each supported container

use feed_archive::{Archive, ArchiveConfig, Observation};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Provider name used by the fixtures
pub const PROVIDER: &str = "feeds.example.org";

/// A small blocklist in the usual "value  # comment" shape
pub const BLOCKLIST: &str = "\
# example.org scanner blocklist
# generated 2024-01-02

192.0.2.1        # ssh brute force
192.0.2.2
198.51.100.0/24  # scanning subnet
evil.example.com
192.0.2.1
";

/// Distinct indicators in [`BLOCKLIST`]
pub const BLOCKLIST_INDICATORS: [&str; 4] = [
    "192.0.2.1",
    "192.0.2.2",
    "198.51.100.0/24",
    "evil.example.com",
];

/// Gzip-compress `content`
pub fn gzip_bytes(content: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(content).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// Write a zip archive holding `members` in order
pub fn write_zip(path: &Path, members: &[(&str, &[u8])]) {
    let file = std::fs::File::create(path).expect("create zip");
    let mut writer = zip::ZipWriter::new(file);
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in members {
        writer.start_file(*name, options).expect("start zip member");
        writer.write_all(content).expect("write zip member");
    }
    writer.finish().expect("finish zip");
}

/// Turn a feed line into an observation, skipping blanks and comments
pub fn parse_line(line: &str, provider: &str) -> Option<Observation> {
    let value = line.split('#').next()?.trim();
    if value.is_empty() {
        return None;
    }
    Some(Observation::new(value, provider).with_tags("scanner,blocklist"))
}

/// Open a fresh archive inside a temp directory
pub async fn open_archive() -> (Archive, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = ArchiveConfig {
        database_path: temp_dir.path().join("runtime").join("archive.db"),
        ..ArchiveConfig::default()
    };
    let archive = Archive::from_config(&config).await.expect("open archive");
    (archive, temp_dir)
}

/// Path inside `dir` for a scratch file
pub fn scratch(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}
