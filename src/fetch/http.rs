use super::{FetchOutcome, Fetcher};
use crate::config::FetchConfig;
use crate::error::{Error, Result, TransferError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Mirrors HTTP(S) feeds with conditional GETs
///
/// The local file's modification time is sent as `If-Modified-Since`; a `304`
/// leaves the file alone. New content is streamed to a sibling `.part` file
/// and renamed over the target once complete, so a failed transfer never
/// truncates the previous copy.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher using the configured user agent and timeout
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| {
                Error::config("user_agent", format!("failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn download(&self, url: url::Url, remote: &str, local: &Path) -> Result<FetchOutcome> {
        let mut request = self.client.get(url);
        if let Some(since) = local_modified(local).await {
            debug!(remote, since = %since, "sending conditional request");
            request = request.header(IF_MODIFIED_SINCE, since.format(HTTP_DATE_FORMAT).to_string());
        }

        let mut response = request.send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("timed out: {}", e)
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                e.to_string()
            };
            TransferError::Request {
                remote: remote.to_string(),
                reason,
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            info!(remote, local = %local.display(), "feed not modified");
            return Ok(FetchOutcome::Unchanged);
        }
        if !status.is_success() {
            return Err(TransferError::Status {
                remote: remote.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let part = part_path(local);
        let mut file = tokio::fs::File::create(&part)
            .await
            .map_err(|e| write_error(&part, e))?;

        let mut bytes: u64 = 0;
        loop {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    drop(file);
                    discard(&part).await;
                    return Err(TransferError::Request {
                        remote: remote.to_string(),
                        reason: format!("failed to read response body: {}", e),
                    }
                    .into());
                }
            };
            if let Err(e) = file.write_all(&chunk).await {
                drop(file);
                discard(&part).await;
                return Err(write_error(&part, e).into());
            }
            bytes += chunk.len() as u64;
        }

        if let Err(e) = file.flush().await {
            drop(file);
            discard(&part).await;
            return Err(write_error(&part, e).into());
        }
        drop(file);

        // Keep the server's timestamp so the next request is conditional on it
        if let Some(modified) = last_modified {
            let target = part.clone();
            let applied = tokio::task::spawn_blocking(move || set_modified(&target, modified.into()))
                .await
                .map_err(|e| e.to_string())
                .and_then(|result| result.map_err(|e| e.to_string()));
            if let Err(e) = applied {
                warn!(path = %part.display(), error = %e, "failed to apply Last-Modified time");
            }
        }

        tokio::fs::rename(&part, local).await.map_err(|e| {
            TransferError::Write {
                path: local.to_path_buf(),
                reason: format!("failed to move download into place: {}", e),
            }
        })?;

        info!(remote, local = %local.display(), bytes, "downloaded feed");
        Ok(FetchOutcome::Downloaded(bytes))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, remote: &str, local: &Path) -> Result<FetchOutcome> {
        let url = url::Url::parse(remote).map_err(|e| TransferError::InvalidRemote {
            remote: remote.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransferError::InvalidRemote {
                remote: remote.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }
            .into());
        }

        self.download(url, remote, local).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

async fn local_modified(local: &Path) -> Option<DateTime<Utc>> {
    let metadata = tokio::fs::metadata(local).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

fn part_path(local: &Path) -> PathBuf {
    let mut name = local
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    local.with_file_name(name)
}

fn set_modified(path: &Path, modified: SystemTime) -> std::io::Result<()> {
    std::fs::OpenOptions::new()
        .write(true)
        .open(path)?
        .set_modified(modified)
}

async fn discard(part: &Path) {
    if let Err(e) = tokio::fs::remove_file(part).await {
        debug!(path = %part.display(), error = %e, "failed to remove partial download");
    }
}

fn write_error(path: &Path, e: std::io::Error) -> TransferError {
    TransferError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}
