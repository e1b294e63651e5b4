//! Seams between the core and the outside world
//!
//! The resolver and orchestrator only see these traits. Default
//! implementations live in [`crate::infra`] and [`crate::core::names`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{RemoteError, SourceError};

/// Options for a single build submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Submit a scratch build
    pub scratch: bool,
    /// Block until the hub reports a terminal state
    pub wait: bool,
    /// Deadline for the submission call
    pub timeout: Duration,
}

/// Remote build hub
#[async_trait]
pub trait RemoteBuildService: Send + Sync {
    /// Names of all packages in a tag
    async fn list_packages(&self, tag: &str) -> Result<Vec<String>, RemoteError>;

    /// Whether a package has a build tagged into `tag`
    async fn package_exists(&self, name: &str, tag: &str) -> Result<bool, RemoteError>;

    /// Submit a build; returns the raw response text
    async fn submit(
        &self,
        target: &str,
        srpm: &Path,
        options: SubmitOptions,
    ) -> Result<String, RemoteError>;

    /// Raw task description
    async fn task_info(&self, task_id: u64) -> Result<String, RemoteError>;

    /// Cancel a task
    async fn cancel(&self, task_id: u64) -> Result<bool, RemoteError>;

    /// Block until the tag's repository has been regenerated
    async fn wait_repo(&self, tag: &str, timeout: Duration) -> Result<bool, RemoteError>;
}

/// Name, version and release of a source package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    /// Package name
    pub name: String,
    /// Version
    pub version: String,
    /// Release
    pub release: String,
}

impl PackageInfo {
    /// Create package info
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        release: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            release: release.into(),
        }
    }

    /// `name-version-release`
    pub fn nvr(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.release)
    }
}

/// Reads build requirements and metadata out of an SRPM
#[async_trait]
pub trait BuildRequirementProvider: Send + Sync {
    /// Raw build requirement tokens
    async fn build_requires(&self, srpm: &Path) -> Result<Vec<String>, SourceError>;

    /// Package metadata
    async fn package_info(&self, srpm: &Path) -> Result<PackageInfo, SourceError>;
}

/// Maps a raw requirement token to a package name
pub trait NameNormalizer: Send + Sync {
    /// Canonical package name for `raw`; unknown tokens pass through
    fn normalize(&self, raw: &str) -> String;
}

/// Finds a buildable SRPM for a package name
#[async_trait]
pub trait SrpmLocator: Send + Sync {
    /// Path to an SRPM, `None` when there is none
    async fn locate(&self, package: &str) -> Result<Option<PathBuf>, SourceError>;
}

/// Locator that never finds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLocator;

#[async_trait]
impl SrpmLocator for NoLocator {
    async fn locate(&self, _package: &str) -> Result<Option<PathBuf>, SourceError> {
        Ok(None)
    }
}
