//! Dependency resolution
//!
//! Walks the build requirements of a root SRPM, checks each one against the
//! build tag on the hub and records everything that still has to be built
//! in a [`DependencyGraph`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::collaborators::{
    BuildRequirementProvider, NameNormalizer, RemoteBuildService, SrpmLocator,
};
use crate::core::graph::{DependencyGraph, DependencyNode};
use crate::error::{RemoteError, ResolverError};

/// Where the SRPM of a worklist entry comes from
enum Source {
    /// Supplied by the caller (the root)
    Given(Option<PathBuf>),
    /// Ask the locator
    Locate,
}

/// Resolves build dependencies against a build tag
pub struct DependencyResolver {
    remote: Arc<dyn RemoteBuildService>,
    requirements: Arc<dyn BuildRequirementProvider>,
    normalizer: Arc<dyn NameNormalizer>,
    tag: String,
    /// Snapshot of the tag's package list, loaded on first use
    available: Option<HashSet<String>>,
    graph: DependencyGraph,
}

impl DependencyResolver {
    /// Create a resolver for `tag`
    pub fn new(
        remote: Arc<dyn RemoteBuildService>,
        requirements: Arc<dyn BuildRequirementProvider>,
        normalizer: Arc<dyn NameNormalizer>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            requirements,
            normalizer,
            tag: tag.into(),
            available: None,
            graph: DependencyGraph::new(),
        }
    }

    /// Build tag used for availability checks
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The graph from the last `resolve` call
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Drop the cached package list so the next check re-reads the tag
    pub fn refresh_availability(&mut self) {
        tracing::debug!("Invalidating package list for tag {}", self.tag);
        self.available = None;
    }

    async fn available_packages(&mut self) -> Result<&HashSet<String>, RemoteError> {
        if self.available.is_none() {
            let packages = self.remote.list_packages(&self.tag).await?;
            tracing::debug!("Tag {} lists {} packages", self.tag, packages.len());
            self.available = Some(packages.into_iter().collect());
        }
        Ok(self.available.get_or_insert_with(HashSet::new))
    }

    /// Whether `name` is already satisfied in the tag
    ///
    /// The package list snapshot is checked first; names missing from it
    /// are confirmed with a direct query, whose failure counts as "no".
    pub async fn is_available(&mut self, name: &str) -> Result<bool, ResolverError> {
        if self.available_packages().await?.contains(name) {
            return Ok(true);
        }
        match self.remote.package_exists(name, &self.tag).await {
            Ok(exists) => Ok(exists),
            Err(e) => {
                tracing::warn!("Existence check for {name} failed, treating as missing: {e}");
                Ok(false)
            }
        }
    }

    /// Normalize raw requirement tokens and return those not in the tag
    pub async fn find_missing(&mut self, tokens: &[String]) -> Result<Vec<String>, ResolverError> {
        let mut missing = Vec::new();
        for token in tokens {
            let name = self.normalizer.normalize(token);
            if !missing.contains(&name) && !self.is_available(&name).await? {
                missing.push(name);
            }
        }
        Ok(missing)
    }

    /// Build the dependency graph rooted at `root_name`
    ///
    /// Dependencies without a source are looked up through `locator`. Names
    /// whose SRPM already belongs to a node (subpackages of one source) are
    /// folded into that node, so each SRPM is built once. The previous graph
    /// is replaced only once the new one is complete.
    pub async fn resolve(
        &mut self,
        root_name: &str,
        root_srpm: Option<PathBuf>,
        locator: &dyn SrpmLocator,
    ) -> Result<&DependencyGraph, ResolverError> {
        let mut graph = DependencyGraph::new();
        let mut visited: HashSet<String> = HashSet::new();
        // SRPM path -> node built from it
        let mut owners: HashMap<PathBuf, String> = HashMap::new();
        let mut aliases: HashMap<String, String> = HashMap::new();
        let mut worklist = vec![(root_name.to_string(), Source::Given(root_srpm))];

        while let Some((raw, source)) = worklist.pop() {
            if !visited.insert(raw.clone()) {
                continue;
            }
            let name = self.normalizer.normalize(&raw);
            if graph.contains(&name) {
                continue;
            }
            visited.insert(name.clone());

            if self.is_available(&name).await? {
                tracing::debug!("{name} is available in {}", self.tag);
                graph.insert(DependencyNode::available(name));
                continue;
            }

            let srpm = match source {
                Source::Given(path) => path,
                Source::Locate => locate(locator, &name).await,
            };

            if let Some(path) = &srpm {
                if let Some(owner) = owners.get(path) {
                    tracing::info!("{name} comes from the same SRPM as {owner}");
                    aliases.insert(name, owner.clone());
                    continue;
                }
                owners.insert(path.clone(), name.clone());
            }

            let dependencies = match &srpm {
                Some(path) => self.dependencies_of(&name, path).await,
                None => {
                    tracing::warn!("No SRPM for {name}; its requirements cannot be explored");
                    Vec::new()
                }
            };

            // Reverse so the first declared requirement is visited first.
            for dep in dependencies.iter().rev() {
                if !visited.contains(dep) && !graph.contains(dep) {
                    worklist.push((dep.clone(), Source::Locate));
                }
            }

            tracing::info!("{name} needs a build ({} requirements)", dependencies.len());
            graph.insert(DependencyNode::missing(name, srpm).with_dependencies(dependencies));
        }

        graph.redirect(&aliases);
        self.graph = graph;
        Ok(&self.graph)
    }

    async fn dependencies_of(&self, name: &str, srpm: &Path) -> Vec<String> {
        let tokens = match self.requirements.build_requires(srpm).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!("Could not read build requirements of {name}: {e}");
                return Vec::new();
            }
        };

        let mut dependencies: Vec<String> = Vec::with_capacity(tokens.len());
        for token in &tokens {
            let dep = self.normalizer.normalize(token);
            if dep.is_empty() || dep == name || dependencies.contains(&dep) {
                continue;
            }
            dependencies.push(dep);
        }
        dependencies
    }

    /// Linear build order of the current graph
    pub fn topological_sort(&mut self) -> Result<Vec<String>, ResolverError> {
        self.graph.topological_sort()
    }

    /// Leveled build plan of the current graph
    pub fn build_chain(&mut self) -> Result<Vec<Vec<String>>, ResolverError> {
        self.graph.build_chain()
    }

    /// Packages that need a build but have no SRPM
    pub fn missing_packages(&self) -> Vec<String> {
        self.graph.missing_packages()
    }
}

async fn locate(locator: &dyn SrpmLocator, name: &str) -> Option<PathBuf> {
    match locator.locate(name).await {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!("Could not obtain SRPM for {name}: {e}");
            None
        }
    }
}
