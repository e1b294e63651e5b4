//! Koji hub client
//!
//! Talks to the hub by running the `koji` command line client. Connection
//! options are passed on every invocation; no session state is kept.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::{defaults, urls};
use crate::core::collaborators::{RemoteBuildService, SubmitOptions};
use crate::error::RemoteError;
use crate::infra::process;

/// Environment variables cleared to turn off TLS verification in the client
const CA_BUNDLE_VARS: &[(&str, &str)] = &[
    ("PYTHONHTTPSVERIFY", "0"),
    ("REQUESTS_CA_BUNDLE", ""),
    ("CURL_CA_BUNDLE", ""),
];

/// Connection settings for one hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KojiSettings {
    /// Hub XML-RPC URL
    pub server: String,
    /// Web interface URL
    pub web_url: String,
    /// Client certificate
    pub cert: Option<PathBuf>,
    /// CA certificate of the hub
    pub serverca: Option<PathBuf>,
    /// Skip TLS verification
    pub no_ssl_verify: bool,
    /// Path or name of the `koji` binary
    pub binary: PathBuf,
    /// Deadline for short calls
    pub call_timeout: Duration,
}

impl Default for KojiSettings {
    fn default() -> Self {
        Self {
            server: urls::FEDORA_HUB.to_string(),
            web_url: urls::FEDORA_WEB.to_string(),
            cert: None,
            serverca: None,
            no_ssl_verify: false,
            binary: PathBuf::from(defaults::KOJI_BINARY),
            call_timeout: Duration::from_secs(defaults::CALL_TIMEOUT),
        }
    }
}

impl KojiSettings {
    /// Settings for `server` with everything else defaulted
    pub fn for_server(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }
}

/// `koji` command line client
#[derive(Debug, Clone)]
pub struct KojiCli {
    settings: KojiSettings,
}

impl KojiCli {
    /// Create a client
    pub fn new(settings: KojiSettings) -> Self {
        Self { settings }
    }

    /// Connection settings
    pub fn settings(&self) -> &KojiSettings {
        &self.settings
    }

    /// Check that the configured binary can be found
    pub fn locate_binary(&self) -> Result<PathBuf, RemoteError> {
        which::which(&self.settings.binary).map_err(|e| RemoteError::Spawn {
            command: self.settings.binary.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Web page of a task
    pub fn task_url(&self, task_id: u64) -> String {
        urls::task_url(&self.settings.web_url, task_id)
    }

    /// Connection options that precede every subcommand
    pub fn global_args(&self) -> Vec<String> {
        let mut args = vec![format!("--server={}", self.settings.server)];
        if let Some(cert) = &self.settings.cert {
            args.push(format!("--cert={}", cert.display()));
        }
        if let Some(ca) = &self.settings.serverca {
            args.push(format!("--serverca={}", ca.display()));
        }
        args
    }

    /// Arguments of a `build` subcommand
    pub fn build_args(target: &str, srpm: &Path, options: SubmitOptions) -> Vec<String> {
        let mut args = vec!["build".to_string()];
        if options.scratch {
            args.push("--scratch".to_string());
        }
        if !options.wait {
            args.push("--nowait".to_string());
        }
        args.push(target.to_string());
        args.push(srpm.display().to_string());
        args
    }

    /// Arguments of a `wait-repo` subcommand; koji takes minutes
    pub fn wait_repo_args(tag: &str, timeout: Duration) -> Vec<String> {
        let minutes = timeout.as_secs().div_ceil(60).max(1);
        vec![
            "wait-repo".to_string(),
            tag.to_string(),
            format!("--timeout={minutes}"),
        ]
    }

    fn command(&self, args: &[String], cwd: Option<&Path>) -> (Command, String) {
        let global = self.global_args();
        let mut command = Command::new(&self.settings.binary);
        command.args(&global).args(args);
        if self.settings.no_ssl_verify {
            command.envs(CA_BUNDLE_VARS.iter().copied());
        }
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let display = std::iter::once(self.settings.binary.display().to_string())
            .chain(global)
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        (command, display)
    }

    async fn run(&self, args: &[String], deadline: Duration) -> Result<String, RemoteError> {
        let (command, display) = self.command(args, None);
        process::run(command, &display, deadline).await
    }

    async fn query(&self, args: &[&str]) -> Result<String, RemoteError> {
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        self.run(&args, self.settings.call_timeout).await
    }

    /// NVR of the latest source build of `package` in `tag`
    pub async fn latest_source_build(
        &self,
        tag: &str,
        package: &str,
    ) -> Result<Option<String>, RemoteError> {
        let output = self
            .query(&["latest-build", "--type=src", "--quiet", tag, package])
            .await?;
        let nvr = first_column(&output)
            .find(|nvr| split_nvr(nvr).is_some_and(|(name, _, _)| name == package))
            .map(ToString::to_string);
        Ok(nvr)
    }

    /// Download the source RPM of `nvr` into `dir`
    pub async fn download_source_build(
        &self,
        nvr: &str,
        dir: &Path,
        deadline: Duration,
    ) -> Result<(), RemoteError> {
        let args = vec![
            "download-build".to_string(),
            "--type=src".to_string(),
            nvr.to_string(),
        ];
        let (command, display) = self.command(&args, Some(dir));
        process::run(command, &display, deadline).await.map(|_| ())
    }
}

#[async_trait]
impl RemoteBuildService for KojiCli {
    async fn list_packages(&self, tag: &str) -> Result<Vec<String>, RemoteError> {
        let tag_arg = format!("--tag={tag}");
        let output = self.query(&["list-pkgs", &tag_arg, "--quiet"]).await?;
        Ok(first_column(&output).map(ToString::to_string).collect())
    }

    async fn package_exists(&self, name: &str, tag: &str) -> Result<bool, RemoteError> {
        match self
            .query(&["list-tagged", tag, "--package", name, "--quiet"])
            .await
        {
            Ok(output) => Ok(!output.trim().is_empty()),
            // Unknown packages make the client exit non-zero.
            Err(RemoteError::CommandFailed { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn submit(
        &self,
        target: &str,
        srpm: &Path,
        options: SubmitOptions,
    ) -> Result<String, RemoteError> {
        let args = Self::build_args(target, srpm, options);
        self.run(&args, options.timeout).await
    }

    async fn task_info(&self, task_id: u64) -> Result<String, RemoteError> {
        self.query(&["taskinfo", &task_id.to_string()]).await
    }

    async fn cancel(&self, task_id: u64) -> Result<bool, RemoteError> {
        match self.query(&["cancel", &task_id.to_string()]).await {
            Ok(_) => Ok(true),
            Err(RemoteError::CommandFailed { stderr, .. }) => {
                tracing::warn!("Hub refused to cancel task {task_id}: {stderr}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn wait_repo(&self, tag: &str, timeout: Duration) -> Result<bool, RemoteError> {
        let args = Self::wait_repo_args(tag, timeout);
        let deadline = timeout + Duration::from_secs(defaults::REPO_TIMEOUT_GRACE);
        match self.run(&args, deadline).await {
            Ok(_) => Ok(true),
            Err(RemoteError::CommandFailed { stderr, .. }) => {
                tracing::warn!("wait-repo {tag} failed: {stderr}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

fn first_column(output: &str) -> impl Iterator<Item = &str> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
}

/// Split `name-version-release`
pub fn split_nvr(nvr: &str) -> Option<(&str, &str, &str)> {
    let mut parts = nvr.rsplitn(3, '-');
    let release = parts.next()?;
    let version = parts.next()?;
    let name = parts.next()?;
    if name.is_empty() || version.is_empty() || release.is_empty() {
        return None;
    }
    Some((name, version, release))
}
