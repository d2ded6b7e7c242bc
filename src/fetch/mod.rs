//! Feed acquisition
//!
//! A [`Fetcher`] places a feed's remote content at a local path so the
//! [decoder](crate::decoder) can read it. Two implementations are provided:
//!
//! - [`HttpFetcher`] mirrors `http(s)://` feeds, skipping the transfer when
//!   the server reports the local copy is current
//! - [`LocalFetcher`] copies feeds that already live on the filesystem
//!
//! [`fetcher_for`] picks one based on the remote locator.

mod http;
mod local;


pub use http::HttpFetcher;
pub use local::LocalFetcher;

use crate::config::FetchConfig;
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// What a fetch did to the local copy
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// New content was written; carries the number of bytes
    Downloaded(u64),
    /// The local copy was already current and was left untouched
    Unchanged,
}

impl FetchOutcome {
    /// Whether the local file changed
    pub fn is_downloaded(&self) -> bool {
        matches!(self, FetchOutcome::Downloaded(_))
    }
}

/// Places remote feed content at a local path
///
/// Implementations do not retry; a failed transfer surfaces as
/// [`Error::Transfer`](crate::Error::Transfer) and leaves any previous local
/// copy in place.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Bring `local` up to date with `remote`
    async fn fetch(&self, remote: &str, local: &Path) -> Result<FetchOutcome>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Choose a fetcher for `remote`: HTTP for `http://`/`https://`, local otherwise
pub fn fetcher_for(remote: &str, config: &FetchConfig) -> Result<Box<dyn Fetcher>> {
    if remote.starts_with("http://") || remote.starts_with("https://") {
        Ok(Box::new(HttpFetcher::new(config)?))
    } else {
        Ok(Box::new(LocalFetcher::new()))
    }
}

/// Local mirror path for `feed` of `provider`: `<cache_dir>/<provider>/<feed>`
///
/// Creates the provider directory if needed.
pub async fn feed_cache_path(cache_dir: &Path, provider: &str, feed: &str) -> Result<PathBuf> {
    for (what, value) in [("provider", provider), ("feed", feed)] {
        if value.is_empty()
            || value == "."
            || value == ".."
            || value.contains(['/', '\\'])
        {
            return Err(TransferError::InvalidRemote {
                remote: value.to_string(),
                reason: format!("{} name cannot be used as a path component", what),
            }
            .into());
        }
    }

    let dir = cache_dir.join(provider);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| TransferError::Write {
            path: dir.clone(),
            reason: format!("failed to create cache directory: {}", e),
        })?;
    Ok(dir.join(feed))
}
