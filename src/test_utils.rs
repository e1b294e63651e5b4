//! Test utilities
//!
//! In-memory fakes of the collaborator traits and proptest generators.

#[cfg(test)]
pub mod fakes {
    use std::collections::{HashMap, HashSet};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::core::collaborators::{
        BuildRequirementProvider, PackageInfo, RemoteBuildService, SrpmLocator, SubmitOptions,
    };
    use crate::error::{RemoteError, SourceError};

    fn unreachable_error(command: &str) -> RemoteError {
        RemoteError::Spawn {
            command: command.to_string(),
            error: "connection refused".to_string(),
        }
    }

    /// Package name encoded in a fake SRPM path
    pub fn name_of(srpm: &Path) -> String {
        srpm.file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".src.rpm"))
            .unwrap_or_default()
            .to_string()
    }

    /// Hub with a fixed tag listing
    #[derive(Default)]
    pub struct FakeHub {
        listed: HashSet<String>,
        tagged_later: HashSet<String>,
        failing: HashSet<String>,
        unreachable: bool,
        barrier_ok: bool,
        task_states: HashMap<u64, String>,
        pub list_calls: AtomicUsize,
        pub exists_calls: AtomicUsize,
        pub wait_repo_calls: AtomicUsize,
        pub submissions: Mutex<Vec<(String, SubmitOptions)>>,
    }

    impl FakeHub {
        pub fn with_packages(packages: &[&str]) -> Self {
            Self {
                listed: packages.iter().map(ToString::to_string).collect(),
                barrier_ok: true,
                ..Self::default()
            }
        }

        /// Packages the existence query knows about but the listing does not
        pub fn tagged_later(mut self, packages: &[&str]) -> Self {
            self.tagged_later
                .extend(packages.iter().map(ToString::to_string));
            self
        }

        /// Packages whose submission is rejected
        pub fn failing(mut self, packages: &[&str]) -> Self {
            self.failing.extend(packages.iter().map(ToString::to_string));
            self
        }

        pub fn unreachable(mut self) -> Self {
            self.unreachable = true;
            self
        }

        pub fn broken_barrier(mut self) -> Self {
            self.barrier_ok = false;
            self
        }

        pub fn task_state(mut self, task_id: u64, text: &str) -> Self {
            self.task_states.insert(task_id, text.to_string());
            self
        }

        pub fn submitted(&self) -> Vec<String> {
            self.submissions
                .lock()
                .unwrap()
                .iter()
                .map(|(name, _)| name.clone())
                .collect()
        }
    }

    #[async_trait]
    impl RemoteBuildService for FakeHub {
        async fn list_packages(&self, _tag: &str) -> Result<Vec<String>, RemoteError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(unreachable_error("list-pkgs"));
            }
            Ok(self.listed.iter().cloned().collect())
        }

        async fn package_exists(&self, name: &str, _tag: &str) -> Result<bool, RemoteError> {
            self.exists_calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(unreachable_error("list-tagged"));
            }
            Ok(self.listed.contains(name) || self.tagged_later.contains(name))
        }

        async fn submit(
            &self,
            _target: &str,
            srpm: &Path,
            options: SubmitOptions,
        ) -> Result<String, RemoteError> {
            let name = name_of(srpm);
            let mut submissions = self.submissions.lock().unwrap();
            submissions.push((name.clone(), options));
            if self.unreachable || self.failing.contains(&name) {
                return Err(RemoteError::CommandFailed {
                    command: "build".to_string(),
                    code: Some(1),
                    stderr: format!("{name}: BuildError"),
                });
            }
            Ok(format!("Created task: {}\nTask info: ...", 100 + submissions.len()))
        }

        async fn task_info(&self, task_id: u64) -> Result<String, RemoteError> {
            if self.unreachable {
                return Err(unreachable_error("taskinfo"));
            }
            Ok(self
                .task_states
                .get(&task_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn cancel(&self, task_id: u64) -> Result<bool, RemoteError> {
            if self.unreachable {
                return Err(unreachable_error("cancel"));
            }
            Ok(self.task_states.contains_key(&task_id))
        }

        async fn wait_repo(&self, _tag: &str, _timeout: Duration) -> Result<bool, RemoteError> {
            self.wait_repo_calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(unreachable_error("wait-repo"));
            }
            Ok(self.barrier_ok)
        }
    }

    /// Requirement provider keyed by package name
    #[derive(Default)]
    pub struct FakeRequirements {
        requires: HashMap<String, Vec<String>>,
        pub calls: AtomicUsize,
    }

    impl FakeRequirements {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn srpm(name: &str) -> PathBuf {
            PathBuf::from(format!("/srpms/{name}.src.rpm"))
        }

        pub fn requires(mut self, name: &str, deps: &[&str]) -> Self {
            self.requires.insert(
                name.to_string(),
                deps.iter().map(ToString::to_string).collect(),
            );
            self
        }
    }

    #[async_trait]
    impl BuildRequirementProvider for FakeRequirements {
        async fn build_requires(&self, srpm: &Path) -> Result<Vec<String>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.requires.get(&name_of(srpm)).cloned().unwrap_or_default())
        }

        async fn package_info(&self, srpm: &Path) -> Result<PackageInfo, SourceError> {
            Ok(PackageInfo::new(name_of(srpm), "1.0", "1"))
        }
    }

    /// Locator that knows a fixed set of packages
    #[derive(Default)]
    pub struct MapLocator {
        known: HashMap<String, PathBuf>,
        requested: Mutex<Vec<String>>,
    }

    impl MapLocator {
        pub fn with(self, name: &str) -> Self {
            self.with_path(name, FakeRequirements::srpm(name))
        }

        pub fn with_path(mut self, name: &str, path: PathBuf) -> Self {
            self.known.insert(name.to_string(), path);
            self
        }

        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SrpmLocator for MapLocator {
        async fn locate(&self, package: &str) -> Result<Option<PathBuf>, SourceError> {
            self.requested.lock().unwrap().push(package.to_string());
            Ok(self.known.get(package).cloned())
        }
    }

    /// Write an executable shell script named `name` into `dir`
    #[cfg(unix)]
    pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Shell script standing in for the `koji` client
    #[cfg(unix)]
    pub fn fake_koji_script(dir: &Path, body: &str) -> PathBuf {
        write_script(dir, "koji", body)
    }

    /// Temporary directory of empty SRPM files
    pub struct SrpmDir {
        dir: tempfile::TempDir,
    }

    impl SrpmDir {
        pub fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        /// Create `<name>.src.rpm` and return its path
        pub fn create(&self, name: &str) -> PathBuf {
            let path = self.dir.path().join(format!("{name}.src.rpm"));
            std::fs::write(&path, b"").unwrap();
            path
        }
    }
}

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a valid RPM package name
    pub fn package_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_+-]{0,30}[a-z0-9]?".prop_filter("Name must not be empty", |s| !s.is_empty())
    }

    /// Generate an acyclic edge list over `n` packages
    ///
    /// Package `i` may only require packages with a higher index.
    pub fn dag(max_nodes: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
        (1..=max_nodes).prop_flat_map(|n| {
            (0..n)
                .map(|i| proptest::collection::vec((i + 1)..n.max(i + 2), 0..4))
                .collect::<Vec<_>>()
                .prop_map(move |edges| {
                    edges
                        .into_iter()
                        .map(|deps| deps.into_iter().filter(|&d| d < n).collect())
                        .collect()
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_package_name_generator(name in package_name()) {
            prop_assert!(!name.is_empty());
            prop_assert!(name.chars().next().unwrap().is_ascii_lowercase());
        }

        #[test]
        fn test_dag_generator_is_forward_only(edges in dag(12)) {
            for (i, deps) in edges.iter().enumerate() {
                for &d in deps {
                    prop_assert!(d > i && d < edges.len());
                }
            }
        }
    }
}
