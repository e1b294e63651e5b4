//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod analyze;
pub mod build;
pub mod cancel;
pub mod chain;
pub mod download;
pub mod status;
pub mod wait_repo;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Subcommand;

use crate::cli::KojiArgs;
use crate::core::builder::{BuildOptions, BuildOrchestrator};
use crate::core::collaborators::{NameNormalizer, NoLocator, SrpmLocator};
use crate::core::global_config::GlobalConfig;
use crate::core::names::{PassThrough, RuleNormalizer};
use crate::infra::dirs::KojichainDirs;
use crate::infra::fetch::SrpmFetcher;
use crate::infra::koji::{KojiCli, KojiSettings};
use crate::infra::koji_config::KojiClientConfig;
use crate::infra::rpm::RpmQuery;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build an SRPM after building its missing dependencies
    Build(build::BuildArgs),

    /// Show the build requirements of an SRPM and which are missing
    Analyze {
        /// Path to a .src.rpm file
        srpm: PathBuf,

        /// Tag checked for available packages
        #[arg(long, value_name = "TAG")]
        build_tag: Option<String>,

        /// Report requirement names as written
        #[arg(long)]
        no_name_resolution: bool,
    },

    /// Download the SRPM of a package from the source hub
    Download {
        /// Package name or http(s) URL of an SRPM
        package: String,

        /// Directory for downloaded SRPMs
        #[arg(long, value_name = "DIR")]
        download_dir: Option<PathBuf>,

        /// Expected SHA-256 checksum of the SRPM
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
    },

    /// Build SRPMs one after another, stopping at the first failure
    Chain {
        /// Build target
        target: String,

        /// SRPMs in build order
        #[arg(required = true)]
        srpms: Vec<PathBuf>,

        /// Tag waited on between builds
        #[arg(long, value_name = "TAG")]
        build_tag: Option<String>,

        /// Perform scratch builds (not tagged)
        #[arg(long)]
        scratch: bool,
    },

    /// Show the state of a hub task
    Status {
        /// Task id
        task_id: u64,

        /// Poll until the task finishes
        #[arg(long)]
        watch: bool,
    },

    /// Cancel a hub task
    Cancel {
        /// Task id
        task_id: u64,
    },

    /// Wait for the repository of a tag to be regenerated
    WaitRepo {
        /// Tag to wait for (default: the configured build tag)
        tag: Option<String>,

        /// Give up after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
}

impl Commands {
    /// Execute the command
    pub async fn run(self, context: &CommandContext) -> Result<()> {
        match self {
            Self::Build(args) => build::execute(context, args).await,
            Self::Analyze {
                srpm,
                build_tag,
                no_name_resolution,
            } => analyze::execute(context, &srpm, build_tag, no_name_resolution).await,
            Self::Download {
                package,
                download_dir,
                sha256,
            } => download::execute(context, &package, download_dir, sha256.as_deref()).await,
            Self::Chain {
                target,
                srpms,
                build_tag,
                scratch,
            } => chain::execute(context, &target, &srpms, build_tag, scratch).await,
            Self::Status { task_id, watch } => status::execute(context, task_id, watch).await,
            Self::Cancel { task_id } => cancel::execute(context, task_id).await,
            Self::WaitRepo { tag, timeout } => wait_repo::execute(context, tag, timeout).await,
        }
    }
}

/// Configuration shared by every command
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Contents of `config.toml`
    pub config: GlobalConfig,
    /// Platform directories
    pub dirs: KojichainDirs,
    /// Effective build hub settings
    pub koji: KojiSettings,
}

impl CommandContext {
    /// Load configuration files and apply command line overrides
    pub fn load(config_path: Option<&Path>, args: &KojiArgs) -> Result<Self> {
        let dirs = KojichainDirs::new();
        let config = match config_path {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                GlobalConfig::load_from_path(path)
            }
            None => GlobalConfig::load(&dirs),
        }
        .context("Failed to load configuration")?;

        Ok(Self::from_parts(config, dirs, &KojiClientConfig::load(), args))
    }

    /// Combine already loaded layers; flags win over everything else
    pub fn from_parts(
        config: GlobalConfig,
        dirs: KojichainDirs,
        client: &KojiClientConfig,
        args: &KojiArgs,
    ) -> Self {
        let mut koji = config.koji_settings(client);
        if let Some(server) = &args.server {
            koji.server.clone_from(server);
        }
        if let Some(web_url) = &args.web_url {
            koji.web_url.clone_from(web_url);
        }
        if args.cert.is_some() {
            koji.cert.clone_from(&args.cert);
        }
        if args.serverca.is_some() {
            koji.serverca.clone_from(&args.serverca);
        }
        koji.no_ssl_verify |= args.no_ssl_verify;

        Self { config, dirs, koji }
    }

    /// Client for the build hub
    pub fn hub(&self) -> KojiCli {
        KojiCli::new(self.koji.clone())
    }

    /// Client for the build hub, failing early when `koji` is not installed
    pub fn checked_hub(&self) -> Result<KojiCli> {
        let hub = self.hub();
        hub.locate_binary()
            .context("The koji client is required (install the 'koji' package)")?;
        Ok(hub)
    }

    /// SRPM fetcher for the source hub
    pub fn fetcher(&self, download_dir: Option<PathBuf>) -> SrpmFetcher {
        let mut source = self.config.source_settings();
        source.no_ssl_verify = self.koji.no_ssl_verify;
        let fetcher = SrpmFetcher::new(
            KojiCli::new(source),
            self.config.source_tag(),
            download_dir.unwrap_or_else(|| self.config.download_dir(&self.dirs)),
        );
        match self.config.dist_git() {
            Some(dist_git) => fetcher.with_dist_git(dist_git),
            None => fetcher,
        }
    }

    /// Orchestrator wired to the build hub and `rpm`
    pub fn orchestrator(
        &self,
        options: BuildOptions,
        normalizer: Arc<dyn NameNormalizer>,
        locator: Arc<dyn SrpmLocator>,
    ) -> Result<BuildOrchestrator> {
        let hub = self.checked_hub()?;
        Ok(BuildOrchestrator::new(
            Arc::new(hub),
            Arc::new(RpmQuery::new()),
            normalizer,
            locator,
            options,
        ))
    }

    /// Orchestrator for commands that only talk to existing tasks
    pub fn task_orchestrator(&self) -> Result<BuildOrchestrator> {
        let target = self.config.build.target.clone().unwrap_or_default();
        self.orchestrator(
            self.config.build_options(&target),
            Arc::new(PassThrough),
            Arc::new(NoLocator),
        )
    }
}

/// Normalizer selected by `--no-name-resolution`
pub fn normalizer(no_name_resolution: bool) -> Arc<dyn NameNormalizer> {
    if no_name_resolution {
        Arc::new(PassThrough)
    } else {
        Arc::new(RuleNormalizer::new())
    }
}
