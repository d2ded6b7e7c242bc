//! Error types for feed-archive
//!
//! This module provides the error handling for the library:
//! - Storage errors (opening the archive, failed queries)
//! - Decoder errors (unsupported content, unreadable files)
//! - Transfer errors raised by feed fetchers
//! - Configuration and timestamp parsing errors

use std::path::PathBuf;
use thiserror::Error;

use crate::decoder::ContentType;

/// Result type alias for feed-archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for feed-archive
///
/// Each variant carries enough context to diagnose the failure without
/// inspecting the source error chain.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "retention_days")
        key: Option<String>,
    },

    /// The archive's backing file or schema could not be created or opened
    #[error("failed to initialize storage: {0}")]
    StorageInit(String),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// The decoder could not classify the file's content
    #[error("unsupported content type {detected} for {}", path.display())]
    UnsupportedFormat {
        /// File that was sniffed
        path: PathBuf,
        /// What the sniffer classified the content as
        detected: ContentType,
    },

    /// I/O error (missing or unreadable file, invalid UTF-8 in a text stream)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A feed fetcher failed to place the remote content on disk
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// A timestamp string could not be parsed
    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp {
        /// The rejected input
        value: String,
        /// Why parsing failed
        reason: String,
    },
}

/// Database-related errors raised after the archive has been opened
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Errors raised while acquiring a feed file
#[derive(Debug, Error)]
pub enum TransferError {
    /// The remote locator could not be parsed
    #[error("invalid remote '{remote}': {reason}")]
    InvalidRemote {
        /// The rejected locator
        remote: String,
        /// Why it was rejected
        reason: String,
    },

    /// The request could not be sent or the response body not read
    #[error("request to {remote} failed: {reason}")]
    Request {
        /// Remote locator
        remote: String,
        /// Underlying failure
        reason: String,
    },

    /// The server answered with a non-success status
    #[error("{remote} returned HTTP {status}")]
    Status {
        /// Remote locator
        remote: String,
        /// HTTP status code
        status: u16,
    },

    /// The fetched content could not be written to the local path
    #[error("failed to write {}: {reason}", path.display())]
    Write {
        /// Local destination
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Whether this error came from the persistent store
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::StorageInit(_) | Error::Database(_) | Error::Sqlx(_)
        )
    }
}
