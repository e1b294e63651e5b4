//! Global configuration management
//!
//! Reads and manages settings from `config.toml` in the config directory.
//! Values set here override the koji client configuration files and are
//! in turn overridden by command line flags.

use crate::config::{defaults, urls};
use crate::core::builder::{BarrierPolicy, BuildOptions, Timeouts};
use crate::infra::dirs::KojichainDirs;
use crate::infra::dist_git::DistGit;
use crate::infra::koji::KojiSettings;
use crate::infra::koji_config::KojiClientConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Global configuration error types
#[derive(Error, Debug)]
pub enum GlobalConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    ReadError { path: String, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    ParseError { path: String, error: String },
}

/// Global configuration for kojichain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Build hub connection
    #[serde(default)]
    pub koji: KojiConfig,

    /// Default build options
    #[serde(default)]
    pub build: BuildConfig,

    /// Deadlines, in seconds
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Where missing SRPMs come from
    #[serde(default)]
    pub source: SourceConfig,
}

/// Build hub connection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KojiConfig {
    /// Hub URL
    pub server: Option<String>,

    /// Web interface URL
    pub web_url: Option<String>,

    /// Client certificate
    pub cert: Option<PathBuf>,

    /// Hub CA certificate
    pub serverca: Option<PathBuf>,

    /// Skip TLS verification
    pub no_ssl_verify: Option<bool>,

    /// Path of the `koji` binary
    pub binary: Option<PathBuf>,
}

/// Default build options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Default build target
    pub target: Option<String>,

    /// Tag checked for available packages
    pub build_tag: Option<String>,

    /// Submit scratch builds
    pub scratch: Option<bool>,

    /// Concurrent submissions per level
    pub jobs: Option<usize>,

    /// Behaviour when a repository wait fails
    pub barrier_policy: Option<BarrierPolicy>,

    /// Refuse to start when a dependency has no SRPM
    pub require_sources: Option<bool>,
}

/// Deadlines in seconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub build: Option<u64>,
    pub call: Option<u64>,
    pub repo: Option<u64>,
    pub poll: Option<u64>,
}

/// Source hub settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Hub SRPMs are downloaded from
    pub hub: Option<String>,

    /// Tag searched for source builds
    pub tag: Option<String>,

    /// Where downloaded SRPMs are kept
    pub download_dir: Option<PathBuf>,

    /// Rebuild SRPMs from dist-git when the hub has none (default: true)
    pub dist_git: Option<bool>,

    /// Dist-git server spec files are read from
    pub dist_git_url: Option<String>,

    /// Lookaside cache holding the sources of dist-git packages
    pub lookaside_url: Option<String>,
}

impl GlobalConfig {
    /// Load global configuration from the config directory
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `GlobalConfigError::ParseError` if the config file exists but
    /// contains invalid TOML.
    pub fn load(dirs: &KojichainDirs) -> Result<Self, GlobalConfigError> {
        Self::load_from_path(&dirs.global_config_path())
    }

    /// Load global configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, GlobalConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| GlobalConfigError::ReadError {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| GlobalConfigError::ParseError {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Build hub settings, layered over the koji client configuration
    #[must_use]
    pub fn koji_settings(&self, client: &KojiClientConfig) -> KojiSettings {
        let mut settings = KojiSettings::default();
        if let Some(server) = self.koji.server.clone().or_else(|| client.server.clone()) {
            settings.server = server;
        }
        if let Some(web_url) = self.koji.web_url.clone().or_else(|| client.web_url.clone()) {
            settings.web_url = web_url;
        }
        settings.cert = self.koji.cert.clone().or_else(|| client.cert.clone());
        settings.serverca = self.koji.serverca.clone().or_else(|| client.serverca.clone());
        settings.no_ssl_verify = self.koji.no_ssl_verify.unwrap_or(false);
        if let Some(binary) = &self.koji.binary {
            settings.binary.clone_from(binary);
        }
        settings.call_timeout = self.timeouts().call;
        settings
    }

    /// Source hub settings
    ///
    /// The source hub never inherits the build hub's certificates.
    #[must_use]
    pub fn source_settings(&self) -> KojiSettings {
        let mut settings =
            KojiSettings::for_server(self.source.hub.as_deref().unwrap_or(urls::FEDORA_HUB));
        if let Some(binary) = &self.koji.binary {
            settings.binary.clone_from(binary);
        }
        settings.call_timeout = self.timeouts().call;
        settings
    }

    /// Effective source tag
    #[must_use]
    pub fn source_tag(&self) -> &str {
        self.source
            .tag
            .as_deref()
            .unwrap_or(defaults::DEFAULT_SOURCE_TAG)
    }

    /// Dist-git fallback, unless disabled
    ///
    /// Spec files are read from the branch named like the source tag.
    #[must_use]
    pub fn dist_git(&self) -> Option<DistGit> {
        if !self.source.dist_git.unwrap_or(true) {
            return None;
        }
        Some(DistGit::new(self.source_tag()).with_urls(
            self.source.dist_git_url.as_deref().unwrap_or(urls::FEDORA_DIST_GIT),
            self.source.lookaside_url.as_deref().unwrap_or(urls::FEDORA_LOOKASIDE),
        ))
    }

    /// Effective download directory
    #[must_use]
    pub fn download_dir(&self, dirs: &KojichainDirs) -> PathBuf {
        self.source
            .download_dir
            .clone()
            .unwrap_or_else(|| dirs.srpm_dir())
    }

    /// Effective build tag
    #[must_use]
    pub fn build_tag(&self) -> &str {
        self.build
            .build_tag
            .as_deref()
            .unwrap_or(defaults::DEFAULT_BUILD_TAG)
    }

    /// Effective deadlines
    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        let fallback = Timeouts::default();
        let secs = |value: Option<u64>, default: Duration| value.map_or(default, Duration::from_secs);
        Timeouts {
            build: secs(self.timeouts.build, fallback.build),
            call: secs(self.timeouts.call, fallback.call),
            repo: secs(self.timeouts.repo, fallback.repo),
            poll: secs(self.timeouts.poll, fallback.poll),
        }
    }

    /// Build options for `target` with configured defaults applied
    #[must_use]
    pub fn build_options(&self, target: &str) -> BuildOptions {
        let mut options = BuildOptions::new(target, self.build_tag());
        options.scratch = self.build.scratch.unwrap_or(false);
        if let Some(jobs) = self.build.jobs {
            options.jobs = jobs.max(1);
        }
        options.barrier_policy = self.build.barrier_policy.unwrap_or_default();
        options.require_sources = self.build.require_sources.unwrap_or(false);
        options.timeouts = self.timeouts();
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = GlobalConfig::default();
        assert!(config.koji.server.is_none());
        assert!(config.build.jobs.is_none());
        assert_eq!(config.build_tag(), defaults::DEFAULT_BUILD_TAG);
        assert_eq!(config.source_tag(), defaults::DEFAULT_SOURCE_TAG);
        assert_eq!(config.timeouts(), Timeouts::default());
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = GlobalConfig::load_from_path(&temp_dir.path().join("config.toml")).unwrap();
        assert!(config.koji.server.is_none());
    }

    #[test]
    fn test_load_valid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let content = r#"
[koji]
server = "https://koji.example.org/kojihub"

[build]
build_tag = "f40-build"
jobs = 2
barrier_policy = "strict"

[timeouts]
repo = 600
poll = 5
"#;
        fs::write(&config_path, content).unwrap();

        let config = GlobalConfig::load_from_path(&config_path).unwrap();
        assert_eq!(
            config.koji.server.as_deref(),
            Some("https://koji.example.org/kojihub")
        );
        assert_eq!(config.build_tag(), "f40-build");

        let options = config.build_options("f40");
        assert_eq!(options.target, "f40");
        assert_eq!(options.jobs, 2);
        assert_eq!(options.barrier_policy, BarrierPolicy::Strict);
        assert_eq!(options.timeouts.repo, Duration::from_secs(600));
        assert_eq!(options.timeouts.poll, Duration::from_secs(5));
        assert_eq!(options.timeouts.build, Timeouts::default().build);
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "invalid toml [[[").unwrap();

        let result = GlobalConfig::load_from_path(&config_path);
        assert!(matches!(result, Err(GlobalConfigError::ParseError { .. })));
    }

    #[test]
    fn test_unknown_barrier_policy_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[build]\nbarrier_policy = \"sometimes\"\n").unwrap();
        assert!(GlobalConfig::load_from_path(&config_path).is_err());
    }

    #[test]
    fn test_config_file_overrides_koji_client_config() {
        let client = KojiClientConfig {
            server: Some("https://client/kojihub".to_string()),
            web_url: Some("https://client/koji".to_string()),
            cert: Some(PathBuf::from("/client.pem")),
            serverca: None,
        };
        let mut config = GlobalConfig::default();
        config.koji.server = Some("https://config/kojihub".to_string());

        let settings = config.koji_settings(&client);
        assert_eq!(settings.server, "https://config/kojihub");
        assert_eq!(settings.web_url, "https://client/koji");
        assert_eq!(settings.cert, Some(PathBuf::from("/client.pem")));
        assert!(!settings.no_ssl_verify);
    }

    #[test]
    fn test_koji_settings_fall_back_to_fedora() {
        let settings = GlobalConfig::default().koji_settings(&KojiClientConfig::default());
        assert_eq!(settings, KojiSettings::default());
    }

    #[test]
    fn test_source_hub_ignores_build_hub_certificates() {
        let mut config = GlobalConfig::default();
        config.koji.server = Some("https://internal/kojihub".to_string());
        config.koji.cert = Some(PathBuf::from("/internal.pem"));

        let source = config.source_settings();
        assert_eq!(source.server, urls::FEDORA_HUB);
        assert!(source.cert.is_none());
    }

    #[test]
    fn test_dist_git_follows_source_tag_and_can_be_disabled() {
        let mut config = GlobalConfig::default();
        config.source.tag = Some("f40".to_string());
        config.source.dist_git_url = Some("https://git.example.org/rpms/".to_string());

        let dist_git = config.dist_git().unwrap();
        assert_eq!(
            dist_git.spec_url("foo"),
            "https://git.example.org/rpms/foo/raw/f40/f/foo.spec"
        );
        assert_eq!(
            dist_git.source_url("foo", "foo.tgz"),
            format!("{}/foo/foo.tgz", urls::FEDORA_LOOKASIDE)
        );

        config.source.dist_git = Some(false);
        assert!(config.dist_git().is_none());
    }

    #[test]
    fn test_zero_jobs_is_clamped() {
        let mut config = GlobalConfig::default();
        config.build.jobs = Some(0);
        assert_eq!(config.build_options("t").jobs, 1);
    }
}
