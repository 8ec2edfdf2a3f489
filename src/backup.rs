//! # Remote Workspace Backup
//!
//! A workspace can be mirrored to a remote host with `rsync` over `ssh`.
//! Only the build state and the build repository are transferred; project
//! checkouts are cloned again when needed.
//!
//! - **Restore** runs when a workspace is new. A missing backup (rsync exit
//!   code 23, "partial transfer") is not an error.
//! - **Push** runs after a fully successful build with `pullpush`, or on
//!   demand through the `stash` command. The remote directory is created
//!   when missing.

use std::path::Path;
use std::process::Command;

use log::{debug, info};

use crate::config::BackupSettings;
use crate::defaults::{BUILD_REPOSITORY_DIR, BUILD_STATE_FILE};
use crate::error::{Error, Result};

/// rsync exit status for a partial transfer, which is what a missing remote
/// directory produces.
const RSYNC_PARTIAL_TRANSFER: i32 = 23;

/// What the remote backup is used for during a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoteFunction {
    /// Restore a new workspace, never push.
    #[default]
    Pull,
    /// Restore a new workspace and push after a successful run.
    PullPush,
}

impl RemoteFunction {
    pub fn pushes(&self) -> bool {
        matches!(self, RemoteFunction::PullPush)
    }
}

/// `ssh` invocation that never prompts.
pub fn ssh_command() -> String {
    [
        "ssh",
        "-o stricthostkeychecking=no",
        "-o userknownhostsfile=/dev/null",
        "-o batchmode=yes",
        "-o passwordauthentication=no",
    ]
    .join(" ")
}

fn remote_path(settings: &BackupSettings, name: &str) -> String {
    format!(
        "{}:{}/{}",
        settings.remote_host,
        settings.remote_dir.trim_end_matches('/'),
        name
    )
}

/// rsync arguments restoring a workspace from the backup host.
pub fn restore_args(settings: &BackupSettings, workspace: &Path) -> Vec<String> {
    vec![
        "--archive".to_string(),
        "-e".to_string(),
        ssh_command(),
        remote_path(settings, BUILD_REPOSITORY_DIR),
        remote_path(settings, BUILD_STATE_FILE),
        format!("{}/", workspace.display()),
    ]
}

/// rsync arguments pushing a workspace to the backup host.
pub fn push_args(settings: &BackupSettings, workspace: &Path) -> Vec<String> {
    vec![
        "--verbose".to_string(),
        "--archive".to_string(),
        "--rsync-path".to_string(),
        format!("mkdir -p {} && rsync", settings.remote_dir),
        "-e".to_string(),
        ssh_command(),
        workspace.join(BUILD_STATE_FILE).display().to_string(),
        workspace.join(BUILD_REPOSITORY_DIR).display().to_string(),
        format!(
            "{}:{}/",
            settings.remote_host,
            settings.remote_dir.trim_end_matches('/')
        ),
    ]
}

/// Trait for the backup transport - allows mocking in tests
pub trait BackupTransport: Send + Sync {
    /// Restore a workspace; returns false when there was nothing to restore.
    fn restore(&self, settings: &BackupSettings, workspace: &Path) -> Result<bool>;

    /// Push a workspace to the backup host.
    fn push(&self, settings: &BackupSettings, workspace: &Path) -> Result<()>;
}

/// `rsync` over `ssh`
pub struct Rsync {
    executable: String,
}

impl Rsync {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn run(&self, settings: &BackupSettings, args: &[String]) -> Result<Option<i32>> {
        debug!("Running {} {}", self.executable, args.join(" "));
        let output = Command::new(&self.executable)
            .args(args)
            .output()
            .map_err(|e| Error::Backup {
                host: settings.remote_host.clone(),
                message: format!("{} not available: {}", self.executable, e),
            })?;
        if output.status.success() {
            return Ok(None);
        }
        let code = output.status.code();
        debug!(
            "{} exited with {:?}: {}",
            self.executable,
            code,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(Some(code.unwrap_or(-1)))
    }
}

impl Default for Rsync {
    fn default() -> Self {
        Self::new("rsync")
    }
}

impl BackupTransport for Rsync {
    fn restore(&self, settings: &BackupSettings, workspace: &Path) -> Result<bool> {
        info!(
            "Restoring workspace from {}:{}",
            settings.remote_host, settings.remote_dir
        );
        std::fs::create_dir_all(workspace)?;
        match self.run(settings, &restore_args(settings, workspace))? {
            None => Ok(true),
            Some(RSYNC_PARTIAL_TRANSFER) => {
                info!("No backup found on {}", settings.remote_host);
                Ok(false)
            }
            Some(code) => Err(Error::Backup {
                host: settings.remote_host.clone(),
                message: format!("restore failed with exit code {}", code),
            }),
        }
    }

    fn push(&self, settings: &BackupSettings, workspace: &Path) -> Result<()> {
        info!(
            "Pushing workspace to {}:{}",
            settings.remote_host, settings.remote_dir
        );
        match self.run(settings, &push_args(settings, workspace))? {
            None => Ok(()),
            Some(code) => Err(Error::Backup {
                host: settings.remote_host.clone(),
                message: format!("push failed with exit code {}", code),
            }),
        }
    }
}
