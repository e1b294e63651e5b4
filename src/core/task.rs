//! Build tasks and their state machine
//!
//! A [`BuildTask`] moves through `Pending → Building → {Complete, Failed,
//! Canceled}`. A submission that is rejected outright goes straight from
//! `Pending` to `Failed`.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use crate::error::BuildError;

/// Status of a build task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    /// Not yet submitted
    Pending,
    /// Submitted, not finished
    Building,
    /// Finished successfully
    Complete,
    /// Submission or build failed
    Failed,
    /// Canceled on the hub
    Canceled,
}

impl BuildStatus {
    /// Whether the task can no longer change state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Canceled)
    }

    /// Whether `self → to` is a legal transition
    pub fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Building | Self::Failed)
                | (
                    Self::Building,
                    Self::Complete | Self::Failed | Self::Canceled
                )
        )
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Building => write!(f, "building"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// Known fragments of the hub's task state text, checked in order.
const STATUS_TABLE: &[(&str, BuildStatus)] = &[
    ("closed", BuildStatus::Complete),
    ("complete", BuildStatus::Complete),
    ("failed", BuildStatus::Failed),
    ("canceled", BuildStatus::Canceled),
    ("open", BuildStatus::Building),
    ("free", BuildStatus::Building),
    ("assigned", BuildStatus::Building),
];

/// Map the hub's free-text task description to a [`BuildStatus`]
///
/// If the text contains a `State:` line only that line is inspected.
/// Unrecognized text maps to [`BuildStatus::Failed`].
pub fn status_from_text(text: &str) -> BuildStatus {
    let lowered = text.to_lowercase();
    let haystack = lowered
        .lines()
        .find_map(|line| line.trim().strip_prefix("state:"))
        .unwrap_or(&lowered);

    STATUS_TABLE
        .iter()
        .find(|(needle, _)| haystack.contains(needle))
        .map_or(BuildStatus::Failed, |(_, status)| *status)
}

fn task_id_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"Created task:\s*(\d+)").expect("valid regex"),
            Regex::new(r"taskID=(\d+)").expect("valid regex"),
        ]
    })
}

/// Extract the hub task id from a submission response
pub fn parse_task_id(response: &str) -> Option<u64> {
    task_id_patterns().iter().find_map(|pattern| {
        pattern
            .captures(response)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

/// A single build submission
#[derive(Debug, Clone, Serialize)]
pub struct BuildTask {
    /// Package name
    pub package_name: String,
    /// Submitted SRPM
    pub srpm_path: PathBuf,
    /// Build target
    pub target: String,
    /// Hub task id, once known
    pub task_id: Option<u64>,
    /// Current status
    pub status: BuildStatus,
    /// Captured error output
    pub error_message: Option<String>,
    /// Name-version-release of the package
    pub nvr: Option<String>,
}

impl BuildTask {
    /// Create a pending task
    pub fn new(
        package_name: impl Into<String>,
        srpm_path: impl Into<PathBuf>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            srpm_path: srpm_path.into(),
            target: target.into(),
            task_id: None,
            status: BuildStatus::Pending,
            error_message: None,
            nvr: None,
        }
    }

    /// Set the NVR
    #[must_use]
    pub fn with_nvr(mut self, nvr: impl Into<String>) -> Self {
        self.nvr = Some(nvr.into());
        self
    }

    /// Apply a state transition
    pub fn transition(&mut self, to: BuildStatus) -> Result<(), BuildError> {
        if !self.status.can_transition_to(to) {
            return Err(BuildError::InvalidTransition {
                package: self.package_name.clone(),
                from: self.status,
                to,
            });
        }
        tracing::debug!("{}: {} -> {}", self.package_name, self.status, to);
        self.status = to;
        Ok(())
    }

    /// Mark the task submitted
    pub fn submit(&mut self, task_id: Option<u64>) -> Result<(), BuildError> {
        self.transition(BuildStatus::Building)?;
        self.task_id = task_id;
        Ok(())
    }

    /// Mark the task failed with a captured message
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), BuildError> {
        self.transition(BuildStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }
}

/// Aggregate outcome of an orchestration run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildResult {
    /// Overall success
    pub success: bool,
    /// Every submission attempt, in order
    pub tasks: Vec<BuildTask>,
    /// Packages that built successfully
    pub built_packages: Vec<String>,
    /// Packages whose submission or build failed
    pub failed_packages: Vec<String>,
    /// Packages skipped because no SRPM was available
    pub skipped_packages: Vec<String>,
    /// Wall time of the run
    #[serde(with = "duration_secs")]
    pub total_time: Duration,
    /// Why the run stopped early, if it did
    pub aborted: Option<String>,
}

impl BuildResult {
    /// Start an empty, successful result
    pub fn new() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Record a task outcome
    pub fn record(&mut self, task: BuildTask) {
        match task.status {
            BuildStatus::Complete => self.built_packages.push(task.package_name.clone()),
            BuildStatus::Failed | BuildStatus::Canceled => {
                self.failed_packages.push(task.package_name.clone());
                self.success = false;
            }
            BuildStatus::Pending | BuildStatus::Building => {}
        }
        self.tasks.push(task);
    }

    /// Record a package that failed before a task could be created
    pub fn record_failure(&mut self, package: impl Into<String>) {
        self.failed_packages.push(package.into());
        self.success = false;
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}
