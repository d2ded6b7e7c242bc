//! Configuration types for feed-archive

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Indicator archive settings (database location, cache sizing, retention)
///
/// Used as a nested sub-config within [`Config`] and passed to
/// [`Archive::open`](crate::archive::Archive::open).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// SQLite database path (default: "runtime/archive.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Number of providers whose indicators are held in memory at once (default: 1)
    ///
    /// With the default of one, switching providers evicts the previous
    /// provider's index, so a feed run only ever holds its own provider.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Age in days after which observations are purged by cleanup (default: 180)
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            cache_capacity: default_cache_capacity(),
            retention_days: default_retention_days(),
        }
    }
}

/// Line decoding settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Token separating lines (default: "\n")
    #[serde(default = "default_split_token")]
    pub split_token: String,

    /// Maximum number of lines produced per file, 0 = unbounded (default: 0)
    #[serde(default)]
    pub limit: usize,

    /// Strip trailing whitespace from every line (default: true)
    #[serde(default = "default_true")]
    pub rstrip: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            split_token: default_split_token(),
            limit: 0,
            rstrip: true,
        }
    }
}

/// Feed acquisition settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Directory holding mirrored feed files (default: "runtime/cache")
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// User-Agent header sent with HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout (default: 300 seconds)
    #[serde(with = "duration_serde", default = "default_fetch_timeout")]
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            user_agent: default_user_agent(),
            timeout: default_fetch_timeout(),
        }
    }
}

/// Main configuration for feed-archive
///
/// Fields are organized into sub-configs:
/// - [`archive`](ArchiveConfig): database path, provider cache, retention
/// - [`decoder`](DecoderConfig): split token, line limit, whitespace handling
/// - [`fetch`](FetchConfig): mirror directory, HTTP settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Indicator archive settings
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Line decoding settings
    #[serde(default)]
    pub decoder: DecoderConfig,

    /// Feed acquisition settings
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Config {
    /// Parse a configuration from JSON, applying defaults for missing fields
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json).map_err(|e| Error::Config {
            message: format!("failed to parse configuration: {}", e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the archive or decoder misbehave
    pub fn validate(&self) -> Result<()> {
        if self.archive.cache_capacity == 0 {
            return Err(Error::config(
                "cache_capacity",
                "at least one provider must fit in the cache",
            ));
        }
        if self.archive.retention_days == 0 {
            return Err(Error::config(
                "retention_days",
                "retention must be at least one day",
            ));
        }
        if self.decoder.split_token.is_empty() {
            return Err(Error::config("split_token", "split token must not be empty"));
        }
        Ok(())
    }
}

// Default value functions
fn default_runtime_dir() -> PathBuf {
    PathBuf::from("runtime")
}

fn default_database_path() -> PathBuf {
    default_runtime_dir().join("archive.db")
}

fn default_cache_dir() -> PathBuf {
    default_runtime_dir().join("cache")
}

fn default_cache_capacity() -> usize {
    1
}

fn default_retention_days() -> u32 {
    180
}

fn default_split_token() -> String {
    "\n".to_string()
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("feed-archive/{}", env!("CARGO_PKG_VERSION"))
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(300)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
