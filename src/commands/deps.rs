//! # Deps Command Implementation
//!
//! This module implements the `deps` subcommand, which prints the build
//! order of the configured projects and the tree of their dependencies.
//!
//! The command reads the spec files of existing checkouts in the workspace
//! and never runs git, so it reflects the sources of the last build run.
//! Projects without sources are reported and treated as having no
//! dependencies.

use anyhow::Result;
use clap::Args;
use log::warn;
use ptree::{print_tree, TreeItem};
use std::path::PathBuf;

use rpmbuilder::config;
use rpmbuilder::phases::ordering::DependencyGraph;
use rpmbuilder::phases::{phase1, phase2};
use rpmbuilder::project;
use rpmbuilder::workspace::WorkspaceManager;

/// Show the build order and dependencies of configured projects
#[derive(Args, Debug)]
pub struct DepsArgs {
    /// Workspace directory holding the project checkouts.
    ///
    /// Can also be set with the `RPMBUILDER_WORKSPACE` environment variable.
    #[arg(short, long, value_name = "DIR", env = "RPMBUILDER_WORKSPACE")]
    pub workspace: PathBuf,

    /// Path to the INI build configuration file.
    ///
    /// Can also be set with the `RPMBUILDER_CONFIG` environment variable.
    #[arg(short, long, value_name = "FILE", env = "RPMBUILDER_CONFIG")]
    pub config: PathBuf,
}

/// Execute the `deps` command.
pub fn execute(args: DepsArgs) -> Result<()> {
    let build_config = config::from_file(&args.config).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load config from {}: {}",
            args.config.display(),
            e
        )
    })?;
    let projects = project::from_config(&build_config);
    let workspace = WorkspaceManager::new(args.workspace);

    let prepared = phase1::inspect(&workspace, &projects);
    for project in prepared.iter().filter(|p| p.failure.is_some()) {
        warn!(
            "{}: {}",
            project.name(),
            project.failure.as_deref().unwrap_or_default()
        );
    }

    let (graph, order) = phase2::execute(&prepared)
        .map_err(|e| anyhow::anyhow!("Failed to order projects: {}", e))?;

    println!("Build order:");
    for (position, name) in order.iter().enumerate() {
        println!("  {}. {}", position + 1, name);
    }
    println!();

    let tree = dependency_tree(&graph, &order);
    print_tree(&tree).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;

    Ok(())
}

/// Tree of every project in build order with its dependencies below it
fn dependency_tree(graph: &DependencyGraph, order: &[String]) -> TreeNode {
    TreeNode {
        label: "projects".to_string(),
        children: order
            .iter()
            .map(|name| build_tree_node(graph, name))
            .collect(),
    }
}

/// Build a tree node from a project; the graph is acyclic once ordered.
fn build_tree_node(graph: &DependencyGraph, name: &str) -> TreeNode {
    TreeNode {
        label: name.to_string(),
        children: graph
            .dependencies_of(name)
            .iter()
            .map(|dependency| build_tree_node(graph, dependency))
            .collect(),
    }
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}
