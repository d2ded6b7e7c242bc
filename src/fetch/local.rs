use super::{FetchOutcome, Fetcher};
use crate::error::{Result, TransferError};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

/// Fetcher for feeds already on the local filesystem
///
/// The remote is a path (optionally a `file://` URL). When it is the same
/// file as the target nothing is copied.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFetcher;

impl LocalFetcher {
    /// Create a local fetcher
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Fetcher for LocalFetcher {
    async fn fetch(&self, remote: &str, local: &Path) -> Result<FetchOutcome> {
        let source = Path::new(remote.strip_prefix("file://").unwrap_or(remote));

        let metadata = tokio::fs::metadata(source)
            .await
            .map_err(|e| TransferError::InvalidRemote {
                remote: remote.to_string(),
                reason: e.to_string(),
            })?;
        if !metadata.is_file() {
            return Err(TransferError::InvalidRemote {
                remote: remote.to_string(),
                reason: "not a regular file".to_string(),
            }
            .into());
        }

        if same_file(source, local).await {
            return Ok(FetchOutcome::Unchanged);
        }

        let bytes = tokio::fs::copy(source, local)
            .await
            .map_err(|e| TransferError::Write {
                path: local.to_path_buf(),
                reason: e.to_string(),
            })?;

        info!(remote, local = %local.display(), bytes, "copied local feed");
        Ok(FetchOutcome::Downloaded(bytes))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

async fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (
        tokio::fs::canonicalize(a).await,
        tokio::fs::canonicalize(b).await,
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
