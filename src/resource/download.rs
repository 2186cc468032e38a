use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::DownloadConfig;
use crate::error::{ComposerError, ResourceError, Result};

/// True for sources that have to be fetched before use
pub fn is_remote(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Extension of the last path segment of a URL, ignoring query and fragment
pub(crate) fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    let (_host, path) = path.split_once('/')?;
    let segment = path.rsplit('/').next()?;
    let (_, extension) = segment.rsplit_once('.')?;

    let valid = !extension.is_empty()
        && extension.len() <= 5
        && extension.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| extension.to_ascii_lowercase())
}

/// Random file name for a download, keeping the URL's extension
pub fn staged_file_name(url: &str) -> String {
    random_file_name(url_extension(url).as_deref())
}

/// 16 random hex digits plus an optional extension
pub fn random_file_name(extension: Option<&str>) -> String {
    let id: u64 = rand::thread_rng().gen();
    match extension.filter(|e| !e.is_empty()) {
        Some(extension) => format!("{:016x}.{}", id, extension),
        None => format!("{:016x}", id),
    }
}

/// Fetches remote resources into the staging directory
pub struct Downloader {
    client: reqwest::Client,
    staging_dir: PathBuf,
}

impl Downloader {
    pub fn new<P: Into<PathBuf>>(config: &DownloadConfig, staging_dir: P) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ComposerError::generic(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            staging_dir: staging_dir.into(),
        })
    }

    /// Download `url` and return the local path it was written to
    ///
    /// A partially written file is removed when the transfer fails.
    pub async fn fetch(&self, url: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let destination = self.staging_dir.join(staged_file_name(url));

        debug!("Downloading {} -> {:?}", url, destination);

        match self.fetch_into(url, &destination).await {
            Ok(bytes) => {
                info!("Downloaded {} ({} bytes)", url, bytes);
                Ok(destination)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&destination).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove partial download {:?}: {}", destination, cleanup);
                    }
                }
                Err(e)
            }
        }
    }

    async fn fetch_into(&self, url: &str, destination: &Path) -> Result<u64> {
        let failed = |reason: String| ResourceError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(describe_request_error(&e)))?;

        if !response.status().is_success() {
            return Err(failed(format!("server returned status {}", response.status())).into());
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| failed(describe_request_error(&e)))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

fn describe_request_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}

/// Files created for one request that must not outlive it
#[derive(Debug, Default)]
pub struct StagedFiles {
    paths: Vec<PathBuf>,
}

impl StagedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track<P: Into<PathBuf>>(&mut self, path: P) {
        self.paths.push(path.into());
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Remove every tracked file; failures are logged and otherwise ignored
    pub fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed staged file {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove staged file {:?}: {}", path, e),
            }
        }
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        self.cleanup();
    }
}
