//! Phase 2: Ordering
//!
//! Determines the order projects are built in, so that every project builds
//! after the projects producing the packages it requires.
//!
//! ## Process
//!
//! 1.  **Package index**: every package a project produces (main package and
//!     subpackages) is mapped to the project.
//! 2.  **Edges**: project A depends on project B when any `BuildRequires` or
//!     `Requires` of A names a package of B. Self references are ignored, as
//!     are requirements no project provides (they come from the distribution).
//! 3.  **Topological sort**: Kahn's algorithm, always picking the ready
//!     project that comes first in the configuration, so the order is
//!     deterministic.
//! 4.  **Cycle detection**: projects left over after the sort form at least
//!     one cycle; one of them is named in the error.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::debug;

use super::PreparedProject;
use crate::error::{Error, Result};

/// What one project provides and requires, for ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDeclaration {
    pub name: String,
    pub provides: Vec<String>,
    pub requires: Vec<String>,
}

impl From<&PreparedProject> for ProjectDeclaration {
    fn from(prepared: &PreparedProject) -> Self {
        Self {
            name: prepared.name().to_string(),
            provides: prepared.provides(),
            requires: prepared.requires(),
        }
    }
}

/// Dependencies between projects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    /// Project names in configuration order.
    names: Vec<String>,
    /// Project name to the projects it depends on.
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Build the graph of `declarations`, given in configuration order.
    pub fn new(declarations: &[ProjectDeclaration]) -> Self {
        let mut providers: HashMap<&str, &str> = HashMap::new();
        for decl in declarations {
            for package in &decl.provides {
                providers.entry(package.as_str()).or_insert(decl.name.as_str());
            }
        }

        let mut edges = BTreeMap::new();
        for decl in declarations {
            let deps: BTreeSet<String> = decl
                .requires
                .iter()
                .filter_map(|package| providers.get(package.as_str()))
                .filter(|provider| **provider != decl.name)
                .map(|provider| provider.to_string())
                .collect();
            if !deps.is_empty() {
                debug!("{} depends on {:?}", decl.name, deps);
            }
            edges.insert(decl.name.clone(), deps);
        }

        Self {
            names: declarations.iter().map(|d| d.name.clone()).collect(),
            edges,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Projects `name` directly depends on.
    pub fn dependencies_of(&self, name: &str) -> BTreeSet<String> {
        self.edges.get(name).cloned().unwrap_or_default()
    }

    /// Every project depending on `name`, directly or through others.
    pub fn dependents_of(&self, name: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut pending = vec![name.to_string()];
        while let Some(current) = pending.pop() {
            for (project, deps) in &self.edges {
                if deps.contains(&current) && found.insert(project.clone()) {
                    pending.push(project.clone());
                }
            }
        }
        found.remove(name);
        found
    }

    /// Total build order, dependencies first, ties in configuration order.
    pub fn order(&self) -> Result<Vec<String>> {
        let mut remaining: HashMap<&str, usize> = self
            .names
            .iter()
            .map(|n| (n.as_str(), self.edges.get(n).map_or(0, BTreeSet::len)))
            .collect();
        let mut order: Vec<String> = Vec::with_capacity(self.names.len());

        // Scanning in configuration order picks the earliest ready project.
        while let Some(next) = self
            .names
            .iter()
            .find(|n| remaining.get(n.as_str()) == Some(&0))
        {
            remaining.remove(next.as_str());
            for (project, deps) in &self.edges {
                if deps.contains(next) {
                    if let Some(count) = remaining.get_mut(project.as_str()) {
                        *count -= 1;
                    }
                }
            }
            order.push(next.clone());
        }

        if !remaining.is_empty() {
            return Err(Error::CyclicDependency {
                cycle: self.find_cycle(&remaining.keys().copied().collect()),
            });
        }
        Ok(order)
    }

    /// Walk dependencies among the `stuck` projects until one repeats.
    fn find_cycle(&self, stuck: &BTreeSet<&str>) -> Vec<String> {
        let Some(start) = self.names.iter().find(|n| stuck.contains(n.as_str())) else {
            return Vec::new();
        };
        let mut path: Vec<String> = vec![start.clone()];
        loop {
            let current = &path[path.len() - 1];
            let next = self
                .edges
                .get(current)
                .and_then(|deps| deps.iter().find(|d| stuck.contains(d.as_str())));
            let Some(next) = next else {
                return path;
            };
            if let Some(pos) = path.iter().position(|p| p == next) {
                let mut cycle = path.split_off(pos);
                cycle.push(next.clone());
                return cycle;
            }
            path.push(next.clone());
        }
    }
}

/// Execute Phase 2: build the dependency graph and the build order.
pub fn execute(prepared: &[PreparedProject]) -> Result<(DependencyGraph, Vec<String>)> {
    let declarations: Vec<ProjectDeclaration> =
        prepared.iter().map(ProjectDeclaration::from).collect();
    let graph = DependencyGraph::new(&declarations);
    let order = graph.order()?;
    debug!("Build order: {}", order.join(", "));
    Ok((graph, order))
}
