//! # feed-archive
//!
//! Ingestion building blocks for threat-intelligence feeds.
//!
//! ## Overview
//!
//! - [`decoder`] turns a local feed file into text lines, whether it is plain
//!   text, gzip or zip
//! - [`archive`] persists indicator observations in SQLite and answers
//!   "already archived?" from a per-provider in-memory index
//! - [`fetch`] mirrors remote feeds to local files
//!
//! Parsing lines into observations is left to the caller.
//!
//! ## Quick Start
//!
//! ```no_run
//! use feed_archive::{Archive, Config, FeedDecoder, LineOptions, Observation};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let mut archive = Archive::from_config(&config.archive).await?;
//!
//!     let decoder = FeedDecoder::open("runtime/cache/example.org/blocklist");
//!     for line in decoder.lines(&LineOptions::from(&config.decoder))? {
//!         let line = line?;
//!         if line.is_empty() || line.starts_with('#') {
//!             continue;
//!         }
//!         let observation = Observation::new(line, "example.org").with_tags(["scanner"]);
//!         archive.record(&observation).await?;
//!     }
//!
//!     archive.cleanup_expired().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Indicator archive and dedup cache
pub mod archive;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Feed file decoding
pub mod decoder;
/// Error types
pub mod error;
/// Feed acquisition
pub mod fetch;
/// Core types
pub mod types;

// Re-export commonly used types
pub use archive::{Archive, CachedObservation, ProviderCache};
pub use config::{ArchiveConfig, Config, DecoderConfig, FetchConfig};
pub use db::Database;
pub use decoder::{ContentType, FeedDecoder, LineOptions, Lines};
pub use error::{DatabaseError, Error, Result, TransferError};
pub use fetch::{FetchOutcome, Fetcher, HttpFetcher, LocalFetcher, feed_cache_path};
pub use types::{DEFAULT_GROUP, Observation, StoredObservation, Tags};
