//! Artifact acquisition with exponential-backoff retry.
//!
//! Staged initialization downloads each artifact of a source, writes it to
//! the cache directory and hands the local paths to the factory. Fetches are
//! retried per [`RetryPolicy`] (1 s, 2 s, ... capped at the policy maximum).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;

use super::errors::FetchError;
use super::traits::ArtifactFetcher;
use super::types::{is_remote_location, LocalArtifact, RetryPolicy};

/// Fetches artifacts over HTTP(S), or from disk for `file://` and plain paths.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn download(
        &self,
        location: &str,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<Vec<u8>, FetchError> {
        tracing::info!("Downloading engine artifact from: {}", location);

        let response = self.client.get(location).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                location: location.to_string(),
            });
        }

        let total_size = response.content_length().unwrap_or(0);
        let mut data = Vec::with_capacity(total_size as usize);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            data.extend_from_slice(&chunk);

            if total_size > 0 {
                let percent = ((data.len() as f64 / total_size as f64) * 100.0).min(100.0) as u8;
                on_progress(percent);
            }
        }

        Ok(data)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(
        &self,
        location: &str,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<Vec<u8>, FetchError> {
        let data = if is_remote_location(location) {
            self.download(location, on_progress).await?
        } else {
            let path = location.strip_prefix("file://").unwrap_or(location);
            let data = tokio::fs::read(path).await.map_err(|source| FetchError::Read {
                location: location.to_string(),
                source,
            })?;
            on_progress(100);
            data
        };

        if data.is_empty() {
            return Err(FetchError::Empty(location.to_string()));
        }
        Ok(data)
    }
}

/// Fetch one artifact, retrying failures per `policy`.
///
/// `on_retry(attempt, delay, error)` is called before each backoff sleep.
/// Returns the last error once all attempts are spent.
pub async fn fetch_with_retry(
    fetcher: &dyn ArtifactFetcher,
    location: &str,
    policy: &RetryPolicy,
    on_progress: &(dyn Fn(u8) + Send + Sync),
    on_retry: &(dyn Fn(u32, std::time::Duration, &FetchError) + Send + Sync),
) -> Result<Vec<u8>, FetchError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match fetcher.fetch(location, on_progress).await {
            Ok(data) => {
                if attempt > 1 {
                    tracing::info!(location, attempt, "Artifact fetched after retry");
                }
                return Ok(data);
            }
            Err(e) if attempt < attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    location,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Artifact fetch failed, retrying"
                );
                on_retry(attempt, delay, &e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(location, attempts, error = %e, "Artifact fetch failed after all retries");
                return Err(e);
            }
        }
    }
}

/// Write fetched bytes to `dir/<artifact file name>` and mark it executable.
pub async fn materialize(
    dir: &Path,
    artifact: &str,
    data: &[u8],
) -> std::io::Result<LocalArtifact> {
    tokio::fs::create_dir_all(dir).await?;

    let file_name = Path::new(artifact)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| sanitize_component(artifact).into());
    let path: PathBuf = dir.join(file_name);

    // Write to a temp name first so a half-written artifact is never picked up.
    let temp_path = path.with_extension("part");
    tokio::fs::write(&temp_path, data).await?;
    tokio::fs::rename(&temp_path, &path).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).await?;
    }

    tracing::debug!("Materialized {} ({} bytes) at {}", artifact, data.len(), path.display());

    Ok(LocalArtifact {
        name: artifact.to_string(),
        path,
    })
}

/// Make a string safe for use as a single path component.
pub(crate) fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "artifact".to_string()
    } else {
        cleaned
    }
}
