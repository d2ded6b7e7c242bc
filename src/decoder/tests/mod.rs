use crate::decoder::*;
use crate::error::Error;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const FEED: &[u8] = b"# example blocklist\n192.0.2.1   \n198.51.100.0/24\t\n\nevil.example.com\n";

fn expected_feed_lines() -> Vec<String> {
    vec![
        "# example blocklist".to_string(),
        "192.0.2.1".to_string(),
        "198.51.100.0/24".to_string(),
        String::new(),
        "evil.example.com".to_string(),
    ]
}

fn write_text(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn write_gzip(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap();
    path
}

fn write_zip(dir: &Path, name: &str, members: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options = ::zip::write::FileOptions::default()
        .compression_method(::zip::CompressionMethod::Deflated);
    for (member, content) in members {
        writer.start_file(*member, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
    path
}

fn collect(path: &Path, options: &LineOptions) -> Vec<String> {
    FeedDecoder::open(path)
        .lines(options)
        .unwrap()
        .map(|line| line.unwrap())
        .collect()
}

// ---------------------------------------------------------------------------
// Format transparency
// ---------------------------------------------------------------------------

#[test]
fn test_text_gzip_and_zip_yield_identical_lines() {
    let dir = TempDir::new().unwrap();
    // No extensions: detection must work from content alone
    let text = write_text(dir.path(), "feed-a", FEED);
    let gzip = write_gzip(dir.path(), "feed-b", FEED);
    let zip = write_zip(dir.path(), "feed-c", &[("blocklist.txt", FEED)]);

    let options = LineOptions::default();
    let from_text = collect(&text, &options);
    let from_gzip = collect(&gzip, &options);
    let from_zip = collect(&zip, &options);

    assert_eq!(from_text, expected_feed_lines());
    assert_eq!(from_gzip, from_text);
    assert_eq!(from_zip, from_text);
}

#[test]
fn test_detect_reports_container() {
    let dir = TempDir::new().unwrap();
    let text = write_text(dir.path(), "list.gz", FEED); // misleading extension
    let gzip = write_gzip(dir.path(), "list.txt", FEED);
    let zip = write_zip(dir.path(), "list.csv", &[("a", FEED)]);

    assert_eq!(FeedDecoder::open(&text).detect().unwrap(), ContentType::Text);
    assert_eq!(FeedDecoder::open(&gzip).detect().unwrap(), ContentType::Gzip);
    assert_eq!(FeedDecoder::open(&zip).detect().unwrap(), ContentType::Zip);

    let lines = FeedDecoder::open(&gzip).lines(&LineOptions::default()).unwrap();
    assert_eq!(lines.content_type(), ContentType::Gzip);
}

#[test]
fn test_xml_is_decoded_as_text() {
    let dir = TempDir::new().unwrap();
    let xml = write_text(
        dir.path(),
        "feed.xml",
        b"<?xml version=\"1.0\"?>\n<items>\n  <item>192.0.2.9</item>\n</items>\n",
    );
    assert_eq!(
        collect(&xml, &LineOptions::default()),
        vec!["<?xml version=\"1.0\"?>", "<items>", "  <item>192.0.2.9</item>", "</items>"]
    );
}

// ---------------------------------------------------------------------------
// Zip specifics
// ---------------------------------------------------------------------------

#[test]
fn test_zip_members_in_archive_order() {
    let dir = TempDir::new().unwrap();
    let zip = write_zip(
        dir.path(),
        "multi.zip",
        &[("second.txt", b"b1\nb2\n"), ("first.txt", b"a1\n"), ("empty.txt", b"")],
    );
    assert_eq!(collect(&zip, &LineOptions::default()), vec!["b1", "b2", "a1"]);
}

#[test]
fn test_zip_latin1_fallback_yields_line() {
    let dir = TempDir::new().unwrap();
    // 0xe9 is 'é' in Latin-1 and invalid on its own in UTF-8
    let zip = write_zip(
        dir.path(),
        "latin1.zip",
        &[("feed.txt", b"caf\xe9.example\nplain.example\n")],
    );

    let lines: Vec<_> = FeedDecoder::open(&zip)
        .lines(&LineOptions::default())
        .unwrap()
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].as_ref().unwrap(), "caf\u{e9}.example");
    assert_eq!(lines[1].as_ref().unwrap(), "plain.example");
}

#[test]
fn test_zip_uses_split_token() {
    let dir = TempDir::new().unwrap();
    let zip = write_zip(dir.path(), "semi.zip", &[("feed", b"a.example;b.example ;c.example")]);
    let options = LineOptions {
        split_token: ";".to_string(),
        ..LineOptions::default()
    };
    assert_eq!(collect(&zip, &options), vec!["a.example", "b.example", "c.example"]);
}

#[test]
fn test_zip_skips_directory_entries() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dirs.zip");
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options = ::zip::write::FileOptions::default();
    writer.add_directory("data/", options).unwrap();
    writer.start_file("data/list.txt", options).unwrap();
    writer.write_all(b"203.0.113.1\n").unwrap();
    writer.finish().unwrap();

    assert_eq!(collect(&path, &LineOptions::default()), vec!["203.0.113.1"]);
}

/// Single stored member whose central directory declares a zip64
/// uncompressed size of 2^63 bytes while holding only `data`
fn zip_with_inflated_size(name: &str, data: &[u8]) -> Vec<u8> {
    let mut crc = flate2::Crc::new();
    crc.update(data);
    let crc = crc.sum();
    let size = data.len() as u32;
    let name = name.as_bytes();

    let mut bytes = Vec::new();
    // Local file header
    bytes.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
    bytes.extend_from_slice(&45u16.to_le_bytes()); // version needed
    bytes.extend_from_slice(&0u16.to_le_bytes()); // flags
    bytes.extend_from_slice(&0u16.to_le_bytes()); // stored
    bytes.extend_from_slice(&0u16.to_le_bytes()); // time
    bytes.extend_from_slice(&0x21u16.to_le_bytes()); // 1980-01-01
    bytes.extend_from_slice(&crc.to_le_bytes());
    bytes.extend_from_slice(&size.to_le_bytes());
    bytes.extend_from_slice(&size.to_le_bytes());
    bytes.extend_from_slice(&(name.len() as u16).to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(name);
    bytes.extend_from_slice(data);

    let central_offset = bytes.len() as u32;
    bytes.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
    bytes.extend_from_slice(&45u16.to_le_bytes()); // version made by
    bytes.extend_from_slice(&45u16.to_le_bytes()); // version needed
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&0x21u16.to_le_bytes());
    bytes.extend_from_slice(&crc.to_le_bytes());
    bytes.extend_from_slice(&size.to_le_bytes()); // compressed
    bytes.extend_from_slice(&u32::MAX.to_le_bytes()); // uncompressed: see zip64 extra
    bytes.extend_from_slice(&(name.len() as u16).to_le_bytes());
    bytes.extend_from_slice(&12u16.to_le_bytes()); // extra length
    bytes.extend_from_slice(&0u16.to_le_bytes()); // comment length
    bytes.extend_from_slice(&0u16.to_le_bytes()); // disk
    bytes.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
    bytes.extend_from_slice(&0u32.to_le_bytes()); // external attrs
    bytes.extend_from_slice(&0u32.to_le_bytes()); // local header offset
    bytes.extend_from_slice(name);
    bytes.extend_from_slice(&0x0001u16.to_le_bytes()); // zip64 extra
    bytes.extend_from_slice(&8u16.to_le_bytes());
    bytes.extend_from_slice(&(1u64 << 63).to_le_bytes());
    let central_size = bytes.len() as u32 - central_offset;

    // End of central directory
    bytes.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&central_size.to_le_bytes());
    bytes.extend_from_slice(&central_offset.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes
}

#[test]
fn test_zip_declared_size_is_not_trusted() {
    let dir = TempDir::new().unwrap();
    let path = write_text(
        dir.path(),
        "huge.zip",
        &zip_with_inflated_size("feed.txt", b"192.0.2.1\n"),
    );

    // Must come back as lines or an error, never abort the process
    match FeedDecoder::open(&path).lines(&LineOptions::default()) {
        Ok(lines) => {
            for line in lines.flatten() {
                assert_eq!(line, "192.0.2.1");
            }
        }
        Err(Error::Io(_)) => {}
        Err(other) => panic!("expected lines or Io error, got {other:?}"),
    }
}

#[test]
fn test_corrupt_zip_is_io_error() {
    let dir = TempDir::new().unwrap();
    let path = write_text(dir.path(), "broken.zip", b"PK\x03\x04this is not really a zip");
    match FeedDecoder::open(&path).lines(&LineOptions::default()) {
        Err(Error::Io(_)) => {}
        Err(other) => panic!("expected Io error, got {other:?}"),
        Ok(_) => panic!("expected Io error for corrupt zip"),
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[test]
fn test_limit_stops_production() {
    let dir = TempDir::new().unwrap();
    let text = write_text(dir.path(), "feed", FEED);
    let zip = write_zip(dir.path(), "feed.zip", &[("a", b"1\n2\n"), ("b", b"3\n4\n")]);

    let options = LineOptions {
        limit: 2,
        ..LineOptions::default()
    };
    assert_eq!(collect(&text, &options), vec!["# example blocklist", "192.0.2.1"]);
    // Limit spans members
    let limited = LineOptions {
        limit: 3,
        ..LineOptions::default()
    };
    assert_eq!(collect(&zip, &limited), vec!["1", "2", "3"]);
    // Zero means unbounded
    assert_eq!(collect(&text, &LineOptions::default()).len(), 5);
}

#[test]
fn test_rstrip_disabled_keeps_trailing_whitespace() {
    let dir = TempDir::new().unwrap();
    let text = write_text(dir.path(), "feed", b"a  \r\nb\t\n");
    let options = LineOptions {
        rstrip: false,
        ..LineOptions::default()
    };
    assert_eq!(collect(&text, &options), vec!["a  \r", "b\t"]);
    assert_eq!(collect(&text, &LineOptions::default()), vec!["a", "b"]);
}

#[test]
fn test_lines_restarts_per_call() {
    let dir = TempDir::new().unwrap();
    let gzip = write_gzip(dir.path(), "feed", FEED);
    let decoder = FeedDecoder::open(&gzip);

    let mut first = decoder.lines(&LineOptions::default()).unwrap();
    assert_eq!(first.next().unwrap().unwrap(), "# example blocklist");
    drop(first);

    let again: Vec<String> = decoder
        .lines(&LineOptions::default())
        .unwrap()
        .map(|l| l.unwrap())
        .collect();
    assert_eq!(again, expected_feed_lines());
}

#[test]
fn test_options_from_decoder_config() {
    let config = crate::config::DecoderConfig {
        split_token: "|".to_string(),
        limit: 7,
        rstrip: false,
    };
    let options = LineOptions::from(&config);
    assert_eq!(options.split_token, "|");
    assert_eq!(options.limit, 7);
    assert!(!options.rstrip);
}

// ---------------------------------------------------------------------------
// Text and gzip edge cases
// ---------------------------------------------------------------------------

#[test]
fn test_concatenated_gzip_members() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cat.gz");
    let mut bytes = Vec::new();
    for part in [&b"one\ntwo\n"[..], &b"three\n"[..]] {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(part).unwrap();
        bytes.extend(encoder.finish().unwrap());
    }
    std::fs::write(&path, bytes).unwrap();

    assert_eq!(collect(&path, &LineOptions::default()), vec!["one", "two", "three"]);
}

#[test]
fn test_utf8_bom_is_dropped() {
    let dir = TempDir::new().unwrap();
    let text = write_text(dir.path(), "bom", b"\xef\xbb\xbfindicator\n192.0.2.44\n");
    assert_eq!(collect(&text, &LineOptions::default()), vec!["indicator", "192.0.2.44"]);
}

#[test]
fn test_invalid_utf8_text_line_is_io_error() {
    let dir = TempDir::new().unwrap();
    let text = write_text(dir.path(), "latin1", b"ok.example\ncaf\xe9.example\nafter.example\n");

    let lines: Vec<_> = FeedDecoder::open(&text)
        .lines(&LineOptions::default())
        .unwrap()
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0].as_ref().unwrap(), "ok.example");
    match &lines[1] {
        Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::InvalidData),
        other => panic!("expected InvalidData, got {other:?}"),
    }
    assert_eq!(lines[2].as_ref().unwrap(), "after.example");
}

#[test]
fn test_empty_file_yields_no_lines() {
    let dir = TempDir::new().unwrap();
    let empty = write_text(dir.path(), "empty", b"");
    assert!(collect(&empty, &LineOptions::default()).is_empty());
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn test_unsupported_content_is_rejected() {
    let dir = TempDir::new().unwrap();
    let binary = write_text(dir.path(), "feed.txt", &[0x7f, b'E', b'L', b'F', 2, 1, 1, 0, 0, 0]);

    match FeedDecoder::open(&binary).lines(&LineOptions::default()) {
        Err(Error::UnsupportedFormat { path, detected }) => {
            assert_eq!(path, binary);
            assert_eq!(detected, ContentType::Unsupported);
        }
        Err(other) => panic!("expected UnsupportedFormat, got {other:?}"),
        Ok(_) => panic!("expected UnsupportedFormat"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist");

    // Binding never touches the file
    let decoder = FeedDecoder::open(&missing);
    assert_eq!(decoder.path(), missing.as_path());

    match decoder.lines(&LineOptions::default()) {
        Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        Err(other) => panic!("expected Io error, got {other:?}"),
        Ok(_) => panic!("expected Io error"),
    }
}

#[test]
fn test_decode_latin1_maps_bytes_to_code_points() {
    assert_eq!(decode_latin1(b"na\xefve \xa9"), "na\u{ef}ve \u{a9}");
}
