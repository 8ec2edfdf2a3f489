//! # Build Command Implementation
//!
//! This module implements the `build` subcommand, the multi-project mode.
//! It reads an INI build configuration, then checks out, orders and builds
//! every enabled project in the workspace.
//!
//! ## Process
//!
//! 1. **Load Configuration**: Parse the build configuration file.
//! 2. **Resolve Run Options**: Mock configuration and backup host come from
//!    the command line first and the configuration file second.
//! 3. **Run**: Execute all phases through the orchestrator.
//! 4. **Report**: Print the build summary; any failed or blocked project
//!    makes the command fail.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use rpmbuilder::config;
use rpmbuilder::project::Project;

use super::run::{run, RunArgs};

/// Build the projects of a build configuration
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Workspace directory holding checkouts, build state and packages.
    ///
    /// Can also be set with the `RPMBUILDER_WORKSPACE` environment variable.
    #[arg(short, long, value_name = "DIR", env = "RPMBUILDER_WORKSPACE")]
    pub workspace: PathBuf,

    /// Path to the INI build configuration file.
    ///
    /// Can also be set with the `RPMBUILDER_CONFIG` environment variable.
    #[arg(short, long, value_name = "FILE", env = "RPMBUILDER_CONFIG")]
    pub config: PathBuf,

    #[command(flatten)]
    pub run: RunArgs,
}

/// Execute the `build` command.
///
/// # Arguments
/// * `args` - The command arguments
/// * `color_flag` - The value of the global --color flag ("always", "never", or "auto")
pub fn execute(args: BuildArgs, color_flag: &str) -> Result<()> {
    let build_config = config::from_file(&args.config).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load config from {}: {}",
            args.config.display(),
            e
        )
    })?;

    // Disabled projects stay in the list so their workspace data is kept
    let projects: Vec<Project> = build_config.projects.iter().map(Project::from).collect();
    let options = args
        .run
        .run_options(build_config.mock.as_ref(), build_config.backup.as_ref())?;

    run(args.workspace, &projects, &options, color_flag)
}
