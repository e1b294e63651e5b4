//! File download over HTTP(S)
//!
//! Used when the package to build is given as a URL, and for the sources
//! of a dist-git checkout. Downloads are retried with exponential backoff
//! and hashed while streaming.

use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::config::defaults;
use crate::error::DownloadError;

/// Progress callback type (`bytes_downloaded`, `total_bytes`)
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// A downloaded file
#[derive(Debug)]
pub struct DownloadedFile {
    /// Where it was written
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// SHA-256 of the content
    pub checksum: String,
}

/// Fetches SRPMs from URLs
#[derive(Debug, Clone)]
pub struct SrpmDownloader {
    client: reqwest::Client,
    max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds)
    base_delay_ms: u64,
}

impl SrpmDownloader {
    /// Create a downloader with the default retry policy
    pub fn new() -> Self {
        Self::with_retries(defaults::MAX_DOWNLOAD_RETRIES, 1000)
    }

    /// Create a downloader with a custom retry policy
    pub fn with_retries(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(defaults::DOWNLOAD_TIMEOUT))
                .connect_timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            max_retries: max_retries.max(1),
            base_delay_ms,
        }
    }

    /// Maximum attempts per download
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Download `url` into `dir`, keeping the file name from the URL
    ///
    /// If `expected_checksum` is given and does not match, the file is
    /// removed and an error returned.
    pub async fn fetch(
        &self,
        url: &str,
        dir: &Path,
        expected_checksum: Option<&str>,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadedFile, DownloadError> {
        let dest = dir.join(srpm_file_name(url)?);
        self.fetch_to(url, &dest, expected_checksum, progress).await
    }

    /// Download `url` to `dest`
    pub async fn fetch_to(
        &self,
        url: &str,
        dest: &Path,
        expected_checksum: Option<&str>,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadedFile, DownloadError> {
        let mut attempts = 0;
        let mut delay_ms = self.base_delay_ms;
        let result = loop {
            attempts += 1;
            match self.fetch_once(url, dest, progress.as_ref()).await {
                Ok(result) => break result,
                Err(e) if attempts < self.max_retries => {
                    tracing::warn!("Download of {url} failed (attempt {attempts}): {e}");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = (delay_ms * 2).min(30_000);
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(dest).await;
                    tracing::error!("Giving up on {url}: {e}");
                    return Err(DownloadError::MaxRetriesExceeded {
                        url: url.to_string(),
                        retries: self.max_retries,
                    });
                }
            }
        };

        if let Some(expected) = expected_checksum {
            if !result.checksum.eq_ignore_ascii_case(expected) {
                let _ = tokio::fs::remove_file(dest).await;
                return Err(DownloadError::ChecksumMismatch {
                    file: dest.to_path_buf(),
                    expected: expected.to_lowercase(),
                    actual: result.checksum,
                });
            }
        }

        tracing::info!("Downloaded {} ({} bytes)", result.path.display(), result.size);
        Ok(result)
    }

    async fn fetch_once(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<DownloadedFile, DownloadError> {
        let network = |error: String| DownloadError::NetworkError {
            url: url.to_string(),
            error,
        };
        let io = |error: std::io::Error| DownloadError::IoError {
            path: dest.to_path_buf(),
            error: error.to_string(),
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(network(format!("HTTP {}", response.status())));
        }
        let total_size = response.content_length().unwrap_or(0);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io)?;
        }
        let mut file = File::create(dest).await.map_err(io)?;

        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| network(e.to_string()))?;
            file.write_all(&chunk).await.map_err(io)?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            if let Some(cb) = progress {
                cb(downloaded, total_size);
            }
        }
        file.flush().await.map_err(io)?;

        Ok(DownloadedFile {
            path: dest.to_path_buf(),
            size: downloaded,
            checksum: hex::encode(hasher.finalize()),
        })
    }
}

impl Default for SrpmDownloader {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `arg` looks like an HTTP(S) URL
pub fn is_url(arg: &str) -> bool {
    arg.starts_with("http://") || arg.starts_with("https://")
}

/// File name of the SRPM a URL points to
pub fn srpm_file_name(url: &str) -> Result<String, DownloadError> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('/').next() {
        Some(name) if name.ends_with(".src.rpm") => Ok(name.to_string()),
        _ => Err(DownloadError::InvalidUrl {
            url: url.to_string(),
            reason: "does not point to a .src.rpm file".to_string(),
        }),
    }
}

/// SHA-256 of `data`
pub fn compute_checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check a local file against an expected SHA-256
pub async fn verify_checksum(path: &Path, expected: &str) -> Result<(), DownloadError> {
    let data = tokio::fs::read(path).await.map_err(|e| DownloadError::IoError {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    let actual = compute_checksum(&data);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(DownloadError::ChecksumMismatch {
            file: path.to_path_buf(),
            expected: expected.to_lowercase(),
            actual,
        })
    }
}
