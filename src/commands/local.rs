//! # Local Command Implementation
//!
//! This module implements the `local` subcommand, which builds projects
//! straight from directories on the local filesystem instead of git
//! checkouts. Every `*.spec` file at the top of a directory becomes one
//! project: named after the directory when it is the only spec, or
//! `<dir>_<specstem>` when the directory holds several.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rpmbuilder::project::Project;

use super::run::{run, RunArgs};

/// Build projects from local directories
#[derive(Args, Debug)]
pub struct LocalArgs {
    /// Workspace directory holding build state and packages.
    ///
    /// Can also be set with the `RPMBUILDER_WORKSPACE` environment variable.
    #[arg(short, long, value_name = "DIR", env = "RPMBUILDER_WORKSPACE")]
    pub workspace: PathBuf,

    /// Project directories, each with one or more spec files.
    #[arg(value_name = "DIR", required = true, num_args = 1..)]
    pub directories: Vec<PathBuf>,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Execute the `local` command.
pub fn execute(args: LocalArgs, color_flag: &str) -> Result<()> {
    let projects = local_projects(&args.directories)?;
    let options = args.run.run_options(None, None)?;
    run(args.workspace, &projects, &options, color_flag)
}

/// Turn project directories into projects, one per top-level spec file.
pub fn local_projects(directories: &[PathBuf]) -> Result<Vec<Project>> {
    let mut projects = Vec::new();
    let mut names = HashSet::new();

    for directory in directories {
        let directory = directory
            .canonicalize()
            .with_context(|| format!("Project directory {} not found", directory.display()))?;
        let base = directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no directory name", directory.display()))?;

        let specs = spec_files(&directory)?;
        if specs.is_empty() {
            bail!("No spec file found in {}", directory.display());
        }

        let several = specs.len() > 1;
        for spec in specs {
            let name = if several {
                let stem = spec.trim_end_matches(".spec");
                format!("{}_{}", base, stem)
            } else {
                base.clone()
            };
            if !names.insert(name.clone()) {
                bail!("Project {} given more than once", name);
            }
            projects.push(Project::local(name, directory.clone()).with_spec(spec));
        }
    }

    Ok(projects)
}

/// Names of the `*.spec` files directly inside `directory`, sorted.
fn spec_files(directory: &Path) -> Result<Vec<String>> {
    let mut specs = Vec::new();
    let entries = fs::read_dir(directory)
        .with_context(|| format!("Failed to read {}", directory.display()))?;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".spec") && entry.path().is_file() {
            specs.push(name);
        }
    }
    specs.sort();
    Ok(specs)
}
