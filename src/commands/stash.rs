//! # Stash Command Implementation
//!
//! This module implements the `stash` subcommand, which pushes the build
//! state and build repository of a workspace to the remote backup host,
//! independent of any build run.

use anyhow::{bail, Result};
use clap::Args;
use log::info;
use std::path::PathBuf;

use rpmbuilder::backup::{BackupTransport, Rsync};
use rpmbuilder::config::BackupSettings;
use rpmbuilder::defaults;

/// Push a workspace to the remote backup host
#[derive(Args, Debug)]
pub struct StashArgs {
    /// Workspace directory to push.
    ///
    /// Can also be set with the `RPMBUILDER_WORKSPACE` environment variable.
    #[arg(short, long, value_name = "DIR", env = "RPMBUILDER_WORKSPACE")]
    pub workspace: PathBuf,

    /// Backup host.
    #[arg(long, value_name = "HOST")]
    pub remote_host: String,

    /// Directory on the backup host.
    #[arg(long, value_name = "DIR")]
    pub remote_dir: String,
}

/// Execute the `stash` command.
pub fn execute(args: StashArgs) -> Result<()> {
    execute_with(args, &Rsync::default())
}

fn execute_with(args: StashArgs, transport: &dyn BackupTransport) -> Result<()> {
    if !defaults::build_state_path(&args.workspace).is_file() {
        bail!(
            "{} is not a build workspace (no build state found)",
            args.workspace.display()
        );
    }

    let settings = BackupSettings {
        remote_host: args.remote_host,
        remote_dir: args.remote_dir,
    };
    info!(
        "Pushing {} to {}:{}",
        args.workspace.display(),
        settings.remote_host,
        settings.remote_dir
    );
    transport.push(&settings, &args.workspace)?;
    println!(
        "Workspace pushed to {}:{}",
        settings.remote_host, settings.remote_dir
    );
    Ok(())
}
