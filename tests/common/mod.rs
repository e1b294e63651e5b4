//! Common test utilities and helpers
//!
//! In-memory stand-ins for the hub, `rpm` and SRPM lookup, shared by the
//! integration tests. The hub records every submission and repository
//! wait in one ordered log so tests can check level ordering.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use kojichain::core::builder::{BuildOptions, BuildOrchestrator, Timeouts};
use kojichain::core::collaborators::{
    BuildRequirementProvider, NameNormalizer, PackageInfo, RemoteBuildService, SrpmLocator,
    SubmitOptions,
};
use kojichain::core::names::RuleNormalizer;
use kojichain::error::{RemoteError, SourceError};

/// Something the hub was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Build submitted for a package
    Submit(String),
    /// Repository wait for a tag
    WaitRepo(String),
}

/// Package name of an SRPM written by [`SrpmFiles`]
pub fn name_of(srpm: &Path) -> String {
    srpm.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(".src.rpm"))
        .unwrap_or_default()
        .to_string()
}

/// Hub with a mutable tag and an event log
#[derive(Default)]
pub struct ScenarioHub {
    tagged: Mutex<HashSet<String>>,
    failing: HashSet<String>,
    repo_broken: bool,
    events: Mutex<Vec<Event>>,
    next_task: AtomicU64,
}

impl ScenarioHub {
    /// Hub whose build tag already holds `packages`
    pub fn new(packages: &[&str]) -> Self {
        Self {
            tagged: Mutex::new(packages.iter().map(ToString::to_string).collect()),
            next_task: AtomicU64::new(1000),
            ..Self::default()
        }
    }

    /// Submissions of these packages are rejected
    pub fn failing(mut self, packages: &[&str]) -> Self {
        self.failing = packages.iter().map(ToString::to_string).collect();
        self
    }

    /// Repository waits never succeed
    pub fn broken_repo(mut self) -> Self {
        self.repo_broken = true;
        self
    }

    /// Ordered log of submissions and repository waits
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Packages submitted, in order
    pub fn submitted(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Submit(name) => Some(name),
                Event::WaitRepo(_) => None,
            })
            .collect()
    }

    /// Whether `name` is tagged
    pub fn is_tagged(&self, name: &str) -> bool {
        self.tagged.lock().unwrap().contains(name)
    }
}

#[async_trait]
impl RemoteBuildService for ScenarioHub {
    async fn list_packages(&self, _tag: &str) -> Result<Vec<String>, RemoteError> {
        Ok(self.tagged.lock().unwrap().iter().cloned().collect())
    }

    async fn package_exists(&self, name: &str, _tag: &str) -> Result<bool, RemoteError> {
        Ok(self.is_tagged(name))
    }

    async fn submit(
        &self,
        _target: &str,
        srpm: &Path,
        options: SubmitOptions,
    ) -> Result<String, RemoteError> {
        let name = name_of(srpm);
        self.events.lock().unwrap().push(Event::Submit(name.clone()));
        if self.failing.contains(&name) {
            return Err(RemoteError::CommandFailed {
                command: format!("koji build {}", srpm.display()),
                code: Some(1),
                stderr: format!("BuildError: {name} failed to build"),
            });
        }
        if !options.scratch {
            self.tagged.lock().unwrap().insert(name);
        }
        let id = self.next_task.fetch_add(1, Ordering::SeqCst);
        Ok(format!("Created task: {id}\nTask info: https://koji/taskinfo?taskID={id}"))
    }

    async fn task_info(&self, _task_id: u64) -> Result<String, RemoteError> {
        Ok("State: closed".to_string())
    }

    async fn cancel(&self, _task_id: u64) -> Result<bool, RemoteError> {
        Ok(true)
    }

    async fn wait_repo(&self, tag: &str, _timeout: Duration) -> Result<bool, RemoteError> {
        self.events
            .lock()
            .unwrap()
            .push(Event::WaitRepo(tag.to_string()));
        Ok(!self.repo_broken)
    }
}

/// Build requirements keyed by package name
#[derive(Default)]
pub struct FakeRpm {
    requires: HashMap<String, Vec<String>>,
}

impl FakeRpm {
    pub fn new() -> Self {
        Self::default()
    }

    /// `package` requires `deps`
    pub fn requires(mut self, package: &str, deps: &[&str]) -> Self {
        self.requires
            .insert(package.to_string(), deps.iter().map(ToString::to_string).collect());
        self
    }
}

#[async_trait]
impl BuildRequirementProvider for FakeRpm {
    async fn build_requires(&self, srpm: &Path) -> Result<Vec<String>, SourceError> {
        Ok(self.requires.get(&name_of(srpm)).cloned().unwrap_or_default())
    }

    async fn package_info(&self, srpm: &Path) -> Result<PackageInfo, SourceError> {
        if !srpm.exists() {
            return Err(SourceError::NotFound {
                path: srpm.to_path_buf(),
            });
        }
        Ok(PackageInfo::new(name_of(srpm), "1.0", "1.fc40"))
    }
}

/// Directory of empty SRPM files, doubling as a locator
pub struct SrpmFiles {
    dir: TempDir,
}

impl SrpmFiles {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `<name>.src.rpm` and return its path
    pub fn create(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, b"").expect("Failed to write SRPM");
        path
    }

    /// Write several SRPMs
    pub fn create_all(&self, names: &[&str]) {
        for name in names {
            self.create(name);
        }
    }

    /// Where `<name>.src.rpm` lives, whether or not it exists
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{name}.src.rpm"))
    }
}

impl Default for SrpmFiles {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SrpmLocator for SrpmFiles {
    async fn locate(&self, package: &str) -> Result<Option<PathBuf>, SourceError> {
        let path = self.path(package);
        Ok(path.exists().then_some(path))
    }
}

/// Options with millisecond polling
pub fn fast_options() -> BuildOptions {
    let mut options = BuildOptions::new("f40-candidate", "f40-build");
    options.timeouts = Timeouts {
        poll: Duration::from_millis(1),
        ..Timeouts::default()
    };
    options
}

/// Orchestrator over the scenario fakes
pub fn orchestrator(
    hub: &Arc<ScenarioHub>,
    rpm: FakeRpm,
    srpms: &Arc<SrpmFiles>,
    options: BuildOptions,
) -> BuildOrchestrator {
    let normalizer: Arc<dyn NameNormalizer> = Arc::new(RuleNormalizer::new());
    BuildOrchestrator::new(
        hub.clone(),
        Arc::new(rpm),
        normalizer,
        srpms.clone(),
        options,
    )
}

/// Write an executable shell script
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to make script executable");
    path
}
