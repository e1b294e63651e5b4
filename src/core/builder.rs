//! Build orchestration logic
//!
//! Turns a root SRPM into a leveled build plan and drives the hub through
//! it: every level is submitted concurrently, a repository barrier follows
//! each level, and the root is only submitted once every dependency built.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::defaults;
use crate::core::collaborators::{
    BuildRequirementProvider, NameNormalizer, PackageInfo, RemoteBuildService, SrpmLocator,
    SubmitOptions,
};
use crate::core::resolver::DependencyResolver;
use crate::core::task::{parse_task_id, status_from_text, BuildResult, BuildStatus, BuildTask};
use crate::error::{BuildError, ResolverError};

/// What to do when the repository barrier between levels fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarrierPolicy {
    /// Log the failure and continue with the next level
    #[default]
    Lenient,
    /// Stop the run
    Strict,
}

impl fmt::Display for BarrierPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lenient => write!(f, "lenient"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

/// Deadlines for hub interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Blocking build submission and task polling
    pub build: Duration,
    /// Short calls: fire-and-forget submission, queries
    pub call: Duration,
    /// Repository regeneration
    pub repo: Duration,
    /// Interval between task status polls
    pub poll: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            build: Duration::from_secs(defaults::BUILD_TIMEOUT),
            call: Duration::from_secs(defaults::CALL_TIMEOUT),
            repo: Duration::from_secs(defaults::REPO_TIMEOUT),
            poll: Duration::from_secs(defaults::POLL_INTERVAL),
        }
    }
}

/// Settings for one orchestrator
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Build target submissions go to
    pub target: String,
    /// Tag checked for availability and waited on between levels
    pub build_tag: String,
    /// Submit scratch builds
    pub scratch: bool,
    /// Submit without blocking on the hub
    pub nowait: bool,
    /// Concurrent submissions per level
    pub jobs: usize,
    /// Barrier failure handling
    pub barrier_policy: BarrierPolicy,
    /// Refuse to build when a dependency has no SRPM
    pub require_sources: bool,
    /// Deadlines
    pub timeouts: Timeouts,
}

impl BuildOptions {
    /// Options with defaults for everything but the target and tag
    pub fn new(target: impl Into<String>, build_tag: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            build_tag: build_tag.into(),
            scratch: false,
            nowait: false,
            jobs: num_cpus::get(),
            barrier_policy: BarrierPolicy::default(),
            require_sources: false,
            timeouts: Timeouts::default(),
        }
    }

    /// Set the barrier policy
    #[must_use]
    pub fn with_barrier_policy(mut self, policy: BarrierPolicy) -> Self {
        self.barrier_policy = policy;
        self
    }

    /// Set the number of concurrent submissions
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }
}

/// Leveled plan for a root package
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    /// The package being built
    pub root: PackageInfo,
    /// Dependency levels, root excluded
    pub levels: Vec<Vec<String>>,
    /// Dependencies that need a build but have no SRPM
    pub missing: Vec<String>,
}

/// Build orchestrator state
pub struct BuildOrchestrator {
    remote: Arc<dyn RemoteBuildService>,
    requirements: Arc<dyn BuildRequirementProvider>,
    locator: Arc<dyn SrpmLocator>,
    resolver: DependencyResolver,
    options: BuildOptions,
}

impl BuildOrchestrator {
    /// Create a new build orchestrator
    pub fn new(
        remote: Arc<dyn RemoteBuildService>,
        requirements: Arc<dyn BuildRequirementProvider>,
        normalizer: Arc<dyn NameNormalizer>,
        locator: Arc<dyn SrpmLocator>,
        options: BuildOptions,
    ) -> Self {
        let resolver = DependencyResolver::new(
            remote.clone(),
            requirements.clone(),
            normalizer,
            options.build_tag.clone(),
        );
        Self {
            remote,
            requirements,
            locator,
            resolver,
            options,
        }
    }

    /// Orchestrator settings
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// The underlying resolver
    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    fn submit_options(&self, wait: bool) -> SubmitOptions {
        let timeouts = &self.options.timeouts;
        SubmitOptions {
            scratch: self.options.scratch,
            wait,
            timeout: if wait { timeouts.build } else { timeouts.call },
        }
    }

    async fn new_task(&self, name: Option<&str>, srpm: &Path) -> BuildTask {
        let info = match self.requirements.package_info(srpm).await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!("Could not read metadata of {}: {e}", srpm.display());
                None
            }
        };
        let package = name
            .map(ToString::to_string)
            .or_else(|| info.as_ref().map(|i| i.name.clone()))
            .unwrap_or_else(|| package_name_from_path(srpm));

        let task = BuildTask::new(package, srpm, self.options.target.clone());
        match info {
            Some(info) => task.with_nvr(info.nvr()),
            None => task,
        }
    }

    /// Submit `task` and apply the resulting transition
    async fn submit(&self, task: &mut BuildTask, wait: bool) -> Result<(), BuildError> {
        tracing::info!(
            "Submitting {} to {}{}",
            task.package_name,
            task.target,
            if self.options.scratch { " (scratch)" } else { "" }
        );
        let response = self
            .remote
            .submit(&task.target, &task.srpm_path, self.submit_options(wait))
            .await;

        match response {
            Ok(response) => {
                let task_id = parse_task_id(&response);
                if task_id.is_none() {
                    tracing::warn!("No task id in response for {}", task.package_name);
                }
                task.submit(task_id)?;
                if wait {
                    task.transition(BuildStatus::Complete)?;
                }
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                task.fail(message.clone())?;
                Err(BuildError::Submission {
                    package: task.package_name.clone(),
                    message,
                })
            }
        }
    }

    /// Submit a single package
    ///
    /// With `wait` the call blocks until the hub finishes the build and the
    /// task comes back `Complete`; otherwise it comes back `Building`.
    pub async fn build_package(&self, srpm: &Path, wait: bool) -> Result<BuildTask, BuildError> {
        if !srpm.exists() {
            return Err(BuildError::SourceNotFound {
                path: srpm.to_path_buf(),
            });
        }
        let mut task = self.new_task(None, srpm).await;
        self.submit(&mut task, wait).await?;
        Ok(task)
    }

    /// Poll the hub until `task` reaches a terminal state or the build
    /// deadline passes
    pub async fn await_task(&self, task: &mut BuildTask) -> Result<BuildStatus, BuildError> {
        if task.status.is_terminal() {
            return Ok(task.status);
        }
        let Some(task_id) = task.task_id else {
            task.fail("no task id to poll")?;
            return Ok(task.status);
        };

        let timeouts = self.options.timeouts;
        let deadline = Instant::now() + timeouts.build;
        loop {
            let status = self.get_build_status(task_id).await;
            if status.is_terminal() {
                if status == BuildStatus::Failed {
                    task.fail(format!("task {task_id} failed"))?;
                } else {
                    task.transition(status)?;
                }
                return Ok(status);
            }

            let now = Instant::now();
            if now >= deadline {
                task.fail(format!(
                    "task {task_id} still running after {}s",
                    timeouts.build.as_secs()
                ))?;
                return Ok(task.status);
            }
            tokio::time::sleep(timeouts.poll.min(deadline - now)).await;
        }
    }

    /// Submit a dependency and see it through to a terminal state
    async fn build_dependency(&self, name: &str, srpm: &Path) -> BuildTask {
        let mut task = self.new_task(Some(name), srpm).await;
        if !srpm.exists() {
            let _ = task.fail(format!("SRPM not found: {}", srpm.display()));
            return task;
        }

        let wait = !self.options.nowait;
        if let Err(e) = self.submit(&mut task, wait).await {
            tracing::warn!("{e}");
            return task;
        }
        if !wait {
            if let Err(e) = self.await_task(&mut task).await {
                tracing::warn!("Lost track of {name}: {e}");
            }
        }
        if task.status == BuildStatus::Complete {
            tracing::info!("{name} built");
        } else {
            tracing::warn!("{name} ended as {}", task.status);
        }
        task
    }

    /// Resolve the dependencies of `srpm` and compute the leveled plan
    ///
    /// Cycles, and missing sources when they are required, are reported
    /// here, before anything is submitted.
    pub async fn plan(&mut self, srpm: &Path) -> Result<BuildPlan, BuildError> {
        if !srpm.exists() {
            return Err(BuildError::SourceNotFound {
                path: srpm.to_path_buf(),
            });
        }
        let root = self.requirements.package_info(srpm).await?;
        tracing::info!("Resolving build dependencies of {}", root.nvr());

        self.resolver
            .resolve(&root.name, Some(srpm.to_path_buf()), self.locator.as_ref())
            .await?;
        let mut levels = self.resolver.build_chain()?;
        for level in &mut levels {
            level.retain(|name| *name != root.name);
        }
        levels.retain(|level| !level.is_empty());

        let missing = self.resolver.missing_packages();
        if !missing.is_empty() {
            if self.options.require_sources {
                return Err(ResolverError::MissingSources { packages: missing }.into());
            }
            tracing::warn!("No SRPM found for: {}", missing.join(", "));
        }

        Ok(BuildPlan {
            root,
            levels,
            missing,
        })
    }

    /// Build `srpm` together with every missing build dependency
    pub async fn build_with_dependencies(&mut self, srpm: &Path) -> Result<BuildResult, BuildError> {
        let started = Instant::now();
        let plan = self.plan(srpm).await?;
        let mut result = BuildResult::new();
        let jobs = self.options.jobs.max(1);

        for (index, level) in plan.levels.iter().enumerate() {
            tracing::info!(
                "Level {}/{}: {}",
                index + 1,
                plan.levels.len(),
                level.join(", ")
            );

            let mut buildable: Vec<(String, PathBuf)> = Vec::with_capacity(level.len());
            for name in level {
                match self.resolver.graph().get(name).and_then(|n| n.srpm_path.clone()) {
                    Some(path) => buildable.push((name.clone(), path)),
                    None => {
                        tracing::warn!("Skipping {name}: no SRPM available");
                        result.skipped_packages.push(name.clone());
                    }
                }
            }
            if buildable.is_empty() {
                continue;
            }

            let this = &*self;
            let tasks: Vec<BuildTask> = stream::iter(&buildable)
                .map(|(name, path)| this.build_dependency(name, path))
                .buffered(jobs)
                .collect()
                .await;
            for task in tasks {
                result.record(task);
            }

            if !self.barrier(&mut result).await {
                result.total_time = started.elapsed();
                return Ok(result);
            }
        }

        if !result.failed_packages.is_empty() {
            tracing::warn!(
                "Not building {}: dependencies failed ({})",
                plan.root.name,
                result.failed_packages.join(", ")
            );
            result.success = false;
            result.total_time = started.elapsed();
            return Ok(result);
        }

        let mut root = BuildTask::new(&plan.root.name, srpm, self.options.target.clone())
            .with_nvr(plan.root.nvr());
        if let Err(e) = self.submit(&mut root, !self.options.nowait).await {
            tracing::error!("{e}");
        }
        result.record(root);
        result.total_time = started.elapsed();
        Ok(result)
    }

    /// Build an explicit, ordered list of packages
    ///
    /// Stops at the first failure; later entries are left untouched. A
    /// repository barrier follows every successful build.
    pub async fn build_chain(&mut self, packages: &[(String, PathBuf)]) -> BuildResult {
        let started = Instant::now();
        let mut result = BuildResult::new();

        for (name, srpm) in packages {
            let task = self.build_dependency(name, srpm).await;
            let built = task.status == BuildStatus::Complete;
            result.record(task);
            if !built {
                tracing::error!("Chain stopped at {name}");
                result.success = false;
                break;
            }
            if !self.barrier(&mut result).await {
                break;
            }
        }

        result.total_time = started.elapsed();
        result
    }

    /// Wait for the build tag's repository and apply the barrier policy
    ///
    /// Returns `false` when the run has to stop.
    async fn barrier(&mut self, result: &mut BuildResult) -> bool {
        let tag = self.options.build_tag.clone();
        let ready = self.wait_for_repo(&tag, self.options.timeouts.repo).await;
        self.resolver.refresh_availability();
        if ready {
            return true;
        }

        match self.options.barrier_policy {
            BarrierPolicy::Lenient => {
                tracing::warn!("Repository for {tag} was not regenerated; continuing");
                true
            }
            BarrierPolicy::Strict => {
                let reason = format!("repository for {tag} was not regenerated");
                tracing::error!("Stopping: {reason}");
                result.success = false;
                result.aborted = Some(reason);
                false
            }
        }
    }

    /// Current status of a hub task
    ///
    /// Unreachable hubs and unknown answers both count as `Failed`.
    pub async fn get_build_status(&self, task_id: u64) -> BuildStatus {
        match self.remote.task_info(task_id).await {
            Ok(text) => status_from_text(&text),
            Err(e) => {
                tracing::warn!("Could not query task {task_id}: {e}");
                BuildStatus::Failed
            }
        }
    }

    /// Ask the hub to cancel a task
    pub async fn cancel_build(&self, task_id: u64) -> bool {
        match self.remote.cancel(task_id).await {
            Ok(canceled) => canceled,
            Err(e) => {
                tracing::warn!("Could not cancel task {task_id}: {e}");
                false
            }
        }
    }

    /// Cancel a running task and record the transition
    pub async fn cancel_task(&self, task: &mut BuildTask) -> Result<bool, BuildError> {
        let Some(task_id) = task.task_id else {
            return Ok(false);
        };
        if !task.status.can_transition_to(BuildStatus::Canceled) {
            return Err(BuildError::InvalidTransition {
                package: task.package_name.clone(),
                from: task.status,
                to: BuildStatus::Canceled,
            });
        }
        if !self.cancel_build(task_id).await {
            return Ok(false);
        }
        task.transition(BuildStatus::Canceled)?;
        Ok(true)
    }

    /// Block until the repository of `tag` is regenerated
    pub async fn wait_for_repo(&self, tag: &str, timeout: Duration) -> bool {
        tracing::info!("Waiting for repository of {tag}");
        match self.remote.wait_repo(tag, timeout).await {
            Ok(ready) => ready,
            Err(e) => {
                tracing::warn!("Waiting for {tag} failed: {e}");
                false
            }
        }
    }
}

fn package_name_from_path(srpm: &Path) -> String {
    let file = srpm
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    file.strip_suffix(".src.rpm").unwrap_or(&file).to_string()
}
