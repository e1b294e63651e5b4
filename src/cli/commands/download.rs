//! Download command implementation
//!
//! Implements `kojichain download`, and the SRPM acquisition shared with
//! `kojichain build`: a path is used as is, a URL is downloaded over HTTP
//! and anything else is treated as a package name and fetched from the
//! source hub.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use super::CommandContext;
use crate::cli::output::{self, status, OutputConfig};
use crate::infra::download::{is_url, verify_checksum, ProgressCallback, SrpmDownloader};
use crate::infra::fetch::SrpmFetcher;

/// How an SRPM argument should be treated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SrpmSource {
    /// Existing file
    Path(PathBuf),
    /// http(s) URL
    Url(String),
    /// Package name to fetch from the source hub
    Package(String),
}

impl SrpmSource {
    /// Classify a command line argument
    pub fn classify(arg: &str) -> Self {
        let path = Path::new(arg);
        if path.exists() {
            Self::Path(path.to_path_buf())
        } else if is_url(arg) {
            Self::Url(arg.to_string())
        } else {
            Self::Package(arg.to_string())
        }
    }
}

/// Turn an SRPM argument into a local file
///
/// With `sha256`, the file must have that SHA-256 checksum; a mismatching
/// download is deleted.
pub async fn acquire(fetcher: &SrpmFetcher, arg: &str, sha256: Option<&str>) -> Result<PathBuf> {
    let path = match SrpmSource::classify(arg) {
        SrpmSource::Path(path) => path
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", path.display()))?,
        SrpmSource::Url(url) => {
            let dir = fetcher.download_dir();
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;

            let bar = output::create_download_bar(0);
            let progress: ProgressCallback = {
                let bar = bar.clone();
                Box::new(move |done: u64, total: u64| {
                    if total > 0 {
                        bar.set_length(total);
                    }
                    bar.set_position(done);
                })
            };
            let downloaded = SrpmDownloader::new()
                .fetch(&url, dir, sha256, Some(progress))
                .await;
            bar.finish_and_clear();

            let downloaded = downloaded.with_context(|| format!("Failed to download {url}"))?;
            tracing::info!(
                "Downloaded {} ({} bytes, sha256 {})",
                downloaded.path.display(),
                downloaded.size,
                downloaded.checksum
            );
            return Ok(downloaded.path);
        }
        SrpmSource::Package(name) => {
            let spinner = output::create_spinner(&format!("Fetching SRPM for {name}"));
            let fetched = fetcher.fetch(&name).await;
            spinner.finish_and_clear();
            fetched.with_context(|| format!("Failed to fetch SRPM for '{name}'"))?
        }
    };

    if let Some(expected) = sha256 {
        verify_checksum(&path, expected).await?;
    }
    Ok(path)
}

#[derive(Serialize)]
struct DownloadReport<'a> {
    package: &'a str,
    path: &'a Path,
}

/// Execute the download command
pub async fn execute(
    context: &CommandContext,
    package: &str,
    download_dir: Option<PathBuf>,
    sha256: Option<&str>,
) -> Result<()> {
    let fetcher = context.fetcher(download_dir);
    if !is_url(package) {
        context.checked_hub()?;
    }
    let path = acquire(&fetcher, package, sha256).await?;

    let config = OutputConfig::global();
    if config.json {
        output::print_json(&DownloadReport {
            package,
            path: &path,
        })?;
    } else if !config.quiet {
        println!("{} Downloaded: {}", status::SUCCESS, path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("foo-1.0-1.src.rpm");
        std::fs::write(&file, b"").unwrap();

        assert_eq!(
            SrpmSource::classify(file.to_str().unwrap()),
            SrpmSource::Path(file.clone())
        );
        assert_eq!(
            SrpmSource::classify("https://example.org/foo-1.0-1.src.rpm"),
            SrpmSource::Url("https://example.org/foo-1.0-1.src.rpm".to_string())
        );
        assert_eq!(
            SrpmSource::classify("python-requests"),
            SrpmSource::Package("python-requests".to_string())
        );
    }

    #[tokio::test]
    async fn test_acquire_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("foo-1.0-1.src.rpm");
        std::fs::write(&file, b"").unwrap();

        let fetcher = SrpmFetcher::new(
            crate::infra::koji::KojiCli::new(Default::default()),
            "rawhide",
            dir.path().join("srpms"),
        );
        let path = acquire(&fetcher, file.to_str().unwrap(), None).await.unwrap();
        assert_eq!(path, file.canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_acquire_url_downloads_into_fetcher_dir() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pkgs/foo-1.0-1.src.rpm"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"srpm".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = SrpmFetcher::new(
            crate::infra::koji::KojiCli::new(Default::default()),
            "rawhide",
            dir.path().join("srpms"),
        );
        let url = format!("{}/pkgs/foo-1.0-1.src.rpm", server.uri());
        let path = acquire(&fetcher, &url, None).await.unwrap();
        assert_eq!(path, dir.path().join("srpms/foo-1.0-1.src.rpm"));
        assert_eq!(std::fs::read(&path).unwrap(), b"srpm");
    }

    #[tokio::test]
    async fn test_acquire_rejects_checksum_mismatch() {
        use crate::infra::download::compute_checksum;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pkgs/foo-1.0-1.src.rpm"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"srpm".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = SrpmFetcher::new(
            crate::infra::koji::KojiCli::new(Default::default()),
            "rawhide",
            dir.path().join("srpms"),
        );
        let url = format!("{}/pkgs/foo-1.0-1.src.rpm", server.uri());

        let wrong = compute_checksum(b"something else");
        assert!(acquire(&fetcher, &url, Some(&wrong)).await.is_err());
        assert!(!dir.path().join("srpms/foo-1.0-1.src.rpm").exists());

        let right = compute_checksum(b"srpm");
        let path = acquire(&fetcher, &url, Some(&right)).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"srpm");
    }

    #[tokio::test]
    async fn test_acquire_checks_local_file() {
        use crate::infra::download::compute_checksum;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("foo-1.0-1.src.rpm");
        std::fs::write(&file, b"local").unwrap();
        let fetcher = SrpmFetcher::new(
            crate::infra::koji::KojiCli::new(Default::default()),
            "rawhide",
            dir.path().join("srpms"),
        );
        let arg = file.to_str().unwrap();

        assert!(acquire(&fetcher, arg, Some(&compute_checksum(b"local")))
            .await
            .is_ok());
        let err = acquire(&fetcher, arg, Some(&compute_checksum(b"remote")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Checksum mismatch"));
        assert!(file.exists());
    }
}
