//! SRPM acquisition from a source hub
//!
//! Missing dependencies are located by asking a koji hub (Fedora's by
//! default) for the latest source build of the package and downloading it.
//! When no tag has a build, the SRPM can be rebuilt from dist-git instead.
//! Each package gets its own directory under the download directory; an
//! SRPM already present there is reused.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::config::defaults;
use crate::core::collaborators::SrpmLocator;
use crate::core::names::srpm_candidates;
use crate::error::SourceError;
use crate::infra::dist_git::DistGit;
use crate::infra::koji::KojiCli;

/// Tag tried when the configured source tag has no build
const FALLBACK_TAG: &str = "rawhide";

/// Downloads source RPMs through `koji download-build`
pub struct SrpmFetcher {
    hub: KojiCli,
    tags: Vec<String>,
    download_dir: PathBuf,
    timeout: Duration,
    dist_git: Option<DistGit>,
    cache: Mutex<HashMap<String, PathBuf>>,
}

impl SrpmFetcher {
    /// Create a fetcher for `source_tag` on `hub`
    pub fn new(hub: KojiCli, source_tag: impl Into<String>, download_dir: impl Into<PathBuf>) -> Self {
        let source_tag = source_tag.into();
        let mut tags = vec![source_tag.clone()];
        if source_tag != FALLBACK_TAG {
            tags.push(FALLBACK_TAG.to_string());
        }
        Self {
            hub,
            tags,
            download_dir: download_dir.into(),
            timeout: Duration::from_secs(defaults::DOWNLOAD_TIMEOUT),
            dist_git: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Rebuild SRPMs from dist-git when the hub has none
    #[must_use]
    pub fn with_dist_git(mut self, dist_git: DistGit) -> Self {
        self.dist_git = Some(dist_git);
        self
    }

    /// Where SRPMs are stored
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Forget previously fetched paths
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Delete the download directory and forget fetched paths
    pub async fn cleanup(&self) -> Result<(), SourceError> {
        self.clear_cache();
        match tokio::fs::remove_dir_all(&self.download_dir).await {
            Ok(()) => {
                tracing::info!("Removed {}", self.download_dir.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SourceError::IoError {
                path: self.download_dir.clone(),
                error: e.to_string(),
            }),
        }
    }

    fn cached(&self, package: &str) -> Option<PathBuf> {
        let cache = self.cache.lock().ok()?;
        cache.get(package).filter(|path| path.exists()).cloned()
    }

    fn remember(&self, package: &str, path: &Path) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(package.to_string(), path.to_path_buf());
        }
    }

    /// Obtain an SRPM for `package`
    ///
    /// Source package names derived from `package` are tried in turn, as
    /// is the fallback tag. Only when no candidate has a build on the hub
    /// is dist-git asked for one.
    pub async fn fetch(&self, package: &str) -> Result<PathBuf, SourceError> {
        if let Some(path) = self.cached(package) {
            return Ok(path);
        }

        let candidates = srpm_candidates(package);
        let mut errors = Vec::new();
        for candidate in &candidates {
            let dir = self.download_dir.join(&candidate);
            if let Some(path) = find_srpm(&dir) {
                tracing::debug!("Reusing {}", path.display());
                self.remember(package, &path);
                return Ok(path);
            }

            match self.download(candidate, &dir).await {
                Ok(Some(path)) => {
                    self.remember(package, &path);
                    return Ok(path);
                }
                Ok(None) => {}
                Err(e) => errors.push(format!("{candidate}: {e}")),
            }
        }

        if let Some(dist_git) = &self.dist_git {
            for candidate in &candidates {
                let dir = self.download_dir.join(candidate);
                match dist_git.build_srpm(candidate, &dir).await {
                    Ok(Some(path)) => {
                        self.remember(package, &path);
                        return Ok(path);
                    }
                    Ok(None) => {}
                    Err(e) => errors.push(format!("{candidate} (dist-git): {e}")),
                }
            }
        }

        Err(SourceError::Unavailable {
            package: package.to_string(),
            reason: if errors.is_empty() {
                format!("no source build in {}", self.tags.join(" or "))
            } else {
                errors.join("; ")
            },
        })
    }

    async fn download(&self, candidate: &str, dir: &Path) -> Result<Option<PathBuf>, SourceError> {
        let mut nvr = None;
        for tag in &self.tags {
            match self.hub.latest_source_build(tag, candidate).await {
                Ok(Some(found)) => {
                    nvr = Some(found);
                    break;
                }
                Ok(None) => {}
                Err(e) => tracing::debug!("No build of {candidate} in {tag}: {e}"),
            }
        }
        let Some(nvr) = nvr else {
            return Ok(None);
        };

        tracing::info!("Downloading {nvr}");
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| SourceError::IoError {
                path: dir.to_path_buf(),
                error: e.to_string(),
            })?;
        self.hub
            .download_source_build(&nvr, dir, self.timeout)
            .await
            .map_err(|e| SourceError::Unavailable {
                package: candidate.to_string(),
                reason: e.to_string(),
            })?;

        find_srpm(dir).map(Some).ok_or_else(|| SourceError::Unavailable {
            package: candidate.to_string(),
            reason: format!("download of {nvr} produced no .src.rpm"),
        })
    }
}

#[async_trait]
impl SrpmLocator for SrpmFetcher {
    async fn locate(&self, package: &str) -> Result<Option<PathBuf>, SourceError> {
        match self.fetch(package).await {
            Ok(path) => Ok(Some(path)),
            Err(SourceError::Unavailable { reason, .. }) => {
                tracing::warn!("No SRPM for {package}: {reason}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// First `*.src.rpm` directly inside `dir`, by name
pub(crate) fn find_srpm(dir: &Path) -> Option<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".src.rpm"))
        })
        .collect();
    found.sort();
    found.into_iter().next()
}
