//! Dependency graph of packages that must be built
//!
//! Nodes live in an arena in discovery order and are addressed by name.
//! Edges point from a package to the packages it requires.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use serde::Serialize;

use crate::error::ResolverError;

/// One package encountered during resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyNode {
    /// Canonical package name
    pub name: String,
    /// Buildable source package, if one was found
    pub srpm_path: Option<PathBuf>,
    /// Packages this one requires, in declaration order
    pub dependencies: Vec<String>,
    /// Already satisfied in the build tag
    pub is_available: bool,
    /// Position in the linear build order, once computed
    pub build_order: Option<usize>,
}

impl DependencyNode {
    /// A package already present in the tag
    pub fn available(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            srpm_path: None,
            dependencies: Vec::new(),
            is_available: true,
            build_order: None,
        }
    }

    /// A package that has to be built
    pub fn missing(name: impl Into<String>, srpm_path: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            srpm_path,
            dependencies: Vec::new(),
            is_available: false,
            build_order: None,
        }
    }

    /// Set the dependencies
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Whether this package has to be built
    pub fn needs_build(&self) -> bool {
        !self.is_available
    }
}

/// Dependency graph for one resolution pass
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Nodes in discovery order
    nodes: Vec<DependencyNode>,
    /// Name -> arena index
    index: HashMap<String, usize>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, keeping the existing one if the name is already known
    ///
    /// Returns `true` if the node was inserted.
    pub fn insert(&mut self, node: DependencyNode) -> bool {
        if self.index.contains_key(&node.name) {
            return false;
        }
        self.index.insert(node.name.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    /// Look up a node by name
    pub fn get(&self, name: &str) -> Option<&DependencyNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Whether a node with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Nodes in discovery order
    pub fn nodes(&self) -> impl Iterator<Item = &DependencyNode> {
        self.nodes.iter()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Point requirements at the package that provides them
    ///
    /// `aliases` maps a requirement name to the node built from the same
    /// SRPM. Requirements that collapse onto the node itself are dropped.
    pub fn redirect(&mut self, aliases: &HashMap<String, String>) {
        if aliases.is_empty() {
            return;
        }
        for node in &mut self.nodes {
            let mut dependencies: Vec<String> = Vec::with_capacity(node.dependencies.len());
            for dep in node.dependencies.drain(..) {
                let target = aliases.get(&dep).cloned().unwrap_or(dep);
                if target != node.name && !dependencies.contains(&target) {
                    dependencies.push(target);
                }
            }
            node.dependencies = dependencies;
        }
    }

    fn requires_build(&self, name: &str) -> bool {
        self.get(name).is_some_and(DependencyNode::needs_build)
    }

    /// Compute the linear build order
    ///
    /// Kahn's algorithm over the packages that need a build. Edges into
    /// available packages carry no ordering constraint and are ignored.
    /// Ties are broken by discovery order. Assigns `build_order` on every
    /// ordered node.
    pub fn topological_sort(&mut self) -> Result<Vec<String>, ResolverError> {
        let needs_build: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| self.nodes[i].needs_build())
            .collect();

        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];

        for &i in &needs_build {
            for dep in &self.nodes[i].dependencies {
                if let Some(&d) = self.index.get(dep) {
                    if self.nodes[d].needs_build() {
                        in_degree[i] += 1;
                        dependents[d].push(i);
                    }
                }
            }
        }

        let mut queue: VecDeque<usize> = needs_build
            .iter()
            .copied()
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(needs_build.len());

        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &dependent in &dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() < needs_build.len() {
            let packages = needs_build
                .iter()
                .filter(|&&i| !order.contains(&i))
                .map(|&i| self.nodes[i].name.clone())
                .collect();
            return Err(ResolverError::CircularDependency { packages });
        }

        for node in &mut self.nodes {
            node.build_order = None;
        }
        for (position, &i) in order.iter().enumerate() {
            self.nodes[i].build_order = Some(position);
        }

        Ok(order
            .into_iter()
            .map(|i| self.nodes[i].name.clone())
            .collect())
    }

    /// Group the build order into levels
    ///
    /// A package sits one level above the highest of its dependencies that
    /// need a build, or at level 0 if none do. Packages in the same level
    /// do not depend on each other.
    pub fn build_chain(&mut self) -> Result<Vec<Vec<String>>, ResolverError> {
        let order = self.topological_sort()?;
        let mut levels: HashMap<&str, usize> = HashMap::new();
        let mut chain: Vec<Vec<String>> = Vec::new();

        for name in &order {
            let Some(node) = self.get(name) else {
                continue;
            };
            let level = node
                .dependencies
                .iter()
                .filter(|dep| self.requires_build(dep))
                .filter_map(|dep| levels.get(dep.as_str()))
                .max()
                .map_or(0, |max| max + 1);
            levels.insert(name, level);

            if chain.len() <= level {
                chain.resize_with(level + 1, Vec::new);
            }
            chain[level].push(name.clone());
        }

        Ok(chain)
    }

    /// Packages that need a build but have no source
    pub fn missing_packages(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|node| node.needs_build() && node.srpm_path.is_none())
            .map(|node| node.name.clone())
            .collect()
    }
}
