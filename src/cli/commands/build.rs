//! Build command implementation
//!
//! Implements `kojichain build`: acquire the SRPM, resolve and build its
//! missing dependencies level by level, then build the package itself.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use tokio::time::Instant;

use super::{download, normalizer, CommandContext};
use crate::cli::output::{self, OutputConfig};
use crate::core::builder::{BarrierPolicy, BuildOptions, BuildOrchestrator, BuildPlan};
use crate::core::collaborators::BuildRequirementProvider;
use crate::core::global_config::GlobalConfig;
use crate::core::task::BuildResult;
use crate::error::BuildError;
use crate::infra::rpm::RpmQuery;

/// Arguments of `kojichain build`
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Build target (e.g. f40-candidate)
    pub target: String,

    /// Path to a .src.rpm, an http(s) URL, or a package name to fetch
    pub srpm: String,

    /// Tag checked for available packages and waited on between levels
    #[arg(long, value_name = "TAG")]
    pub build_tag: Option<String>,

    /// Perform scratch builds (not tagged)
    #[arg(long)]
    pub scratch: bool,

    /// Do not block on each submission; dependencies are polled instead
    #[arg(long)]
    pub nowait: bool,

    /// Skip dependency resolution, just build the package
    #[arg(long)]
    pub no_deps: bool,

    /// Show what would be built without submitting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Concurrent submissions per level
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Stop when the repository wait between levels fails
    #[arg(long)]
    pub strict_barrier: bool,

    /// Refuse to start when a dependency has no SRPM
    #[arg(long)]
    pub require_sources: bool,

    /// Directory for downloaded SRPMs
    #[arg(long, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Expected SHA-256 checksum of the SRPM
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,

    /// Delete downloaded SRPMs once the build is over
    #[arg(long)]
    pub cleanup: bool,

    /// Disable package name normalization (macros, virtual provides)
    #[arg(long)]
    pub no_name_resolution: bool,
}

/// Orchestrator options from configuration and flags
pub fn build_options(config: &GlobalConfig, args: &BuildArgs) -> BuildOptions {
    let mut options = config.build_options(&args.target);
    if let Some(tag) = &args.build_tag {
        options.build_tag.clone_from(tag);
    }
    if let Some(jobs) = args.jobs {
        options = options.with_jobs(jobs.max(1));
    }
    if args.strict_barrier {
        options = options.with_barrier_policy(BarrierPolicy::Strict);
    }
    options.scratch |= args.scratch;
    options.nowait = args.nowait;
    options.require_sources |= args.require_sources;
    options
}

/// Execute the build command
pub async fn execute(context: &CommandContext, args: BuildArgs) -> Result<()> {
    let options = build_options(&context.config, &args);
    tracing::info!(
        "Building for {} (tag {}, {} jobs, {} barrier)",
        options.target,
        options.build_tag,
        options.jobs,
        options.barrier_policy
    );

    let fetcher = Arc::new(context.fetcher(args.download_dir.clone()));
    let mut orchestrator =
        context.orchestrator(options, normalizer(args.no_name_resolution), fetcher.clone())?;
    let srpm = download::acquire(&fetcher, &args.srpm, args.sha256.as_deref()).await?;
    let config = OutputConfig::global();

    if args.dry_run {
        let plan = if args.no_deps {
            BuildPlan {
                root: RpmQuery::new().package_info(&srpm).await?,
                levels: Vec::new(),
                missing: Vec::new(),
            }
        } else {
            let spinner = output::create_spinner("Resolving dependencies");
            let plan = orchestrator.plan(&srpm).await;
            spinner.finish_and_clear();
            plan?
        };
        if config.json {
            output::print_json(&plan)?;
        } else if !config.quiet {
            println!("DRY RUN - showing what would be built:\n");
            println!("{}", output::format_plan(&plan));
        }
        return Ok(());
    }

    let result = run_build(&mut orchestrator, &srpm, &args).await;
    if args.cleanup {
        if let Err(e) = fetcher.cleanup().await {
            tracing::warn!("Cleanup failed: {e}");
        }
    }
    let result = result?;

    output::print_build_result(&result)?;
    if !result.success {
        bail!("Build of {} did not succeed", srpm.display());
    }
    Ok(())
}

async fn run_build(
    orchestrator: &mut BuildOrchestrator,
    srpm: &Path,
    args: &BuildArgs,
) -> Result<BuildResult> {
    let result = if args.no_deps {
        let started = Instant::now();
        let mut result = BuildResult::new();
        match orchestrator.build_package(srpm, !args.nowait).await {
            Ok(task) => result.record(task),
            Err(BuildError::Submission { package, message }) => {
                tracing::error!("Build failed for {package}: {message}");
                result.record_failure(package);
            }
            Err(e) => return Err(e.into()),
        }
        result.total_time = started.elapsed();
        result
    } else {
        let spinner = output::create_spinner("Building");
        let result = orchestrator.build_with_dependencies(srpm).await;
        spinner.finish_and_clear();
        result?
    };
    Ok(result)
}
