//! # Workspace Management
//!
//! This module owns the on-disk workspace of a build run and the git
//! checkouts inside it:
//!
//! ```text
//! <workspace>/
//! ├── buildstate.json
//! ├── buildrepository/<root>/{rpm,srpm}
//! ├── mocksettings/checkout
//! └── projects/<name>/{checkout,rpmbuild}
//! ```
//!
//! ## Design
//!
//! Git access goes through the [`GitOperations`] trait so that the pipeline
//! can be exercised without a `git` binary or network access.
//! [`DefaultGitOperations`] wraps the functions of [`crate::git`]; tests
//! replace it with fakes that record calls.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::MockSettings;
use crate::defaults;
use crate::error::{Error, Result};
use crate::project::{Project, ProjectPaths, ProjectSource};

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Create a new clone of `url` in `target_dir`.
    fn clone_repository(&self, url: &str, ref_name: &str, target_dir: &Path) -> Result<()>;

    /// Bring an existing clone up to date with `url`: drop local changes,
    /// correct the origin URL, fetch branches and tags.
    fn update(&self, url: &str, checkout: &Path) -> Result<()>;

    /// Detach the checkout at `ref_name` (branch, tag or commit).
    fn checkout(&self, dir: &Path, ref_name: &str) -> Result<()>;

    /// Full commit id of HEAD.
    fn head_commit(&self, dir: &Path) -> Result<String>;

    /// `git describe --tags --long` output.
    fn describe(&self, dir: &Path) -> Result<String>;

    /// Branch name, `HEAD` when detached.
    fn current_branch(&self, dir: &Path) -> Result<String>;

    fn commit_count(&self, dir: &Path) -> Result<u64>;

    fn short_hash(&self, dir: &Path) -> Result<String>;

    /// Digest of local modifications, `None` for a clean checkout.
    fn dirty_state(&self, dir: &Path) -> Result<Option<String>>;

    fn is_repository(&self, dir: &Path) -> bool;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command.
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn clone_repository(&self, url: &str, ref_name: &str, target_dir: &Path) -> Result<()> {
        crate::git::clone(url, ref_name, target_dir)
    }

    fn update(&self, url: &str, checkout: &Path) -> Result<()> {
        crate::git::reset_hard(checkout)?;
        let existing = crate::git::remote_url(checkout).unwrap_or_default();
        if existing != url {
            info!(
                "Changing origin of {} from '{}' to '{}'",
                checkout.display(),
                existing,
                url
            );
            crate::git::set_remote_url(checkout, url)?;
        }
        crate::git::fetch(checkout)
    }

    fn checkout(&self, dir: &Path, ref_name: &str) -> Result<()> {
        crate::git::checkout(dir, ref_name)
    }

    fn head_commit(&self, dir: &Path) -> Result<String> {
        crate::git::head_commit(dir)
    }

    fn describe(&self, dir: &Path) -> Result<String> {
        crate::git::describe(dir)
    }

    fn current_branch(&self, dir: &Path) -> Result<String> {
        crate::git::current_branch(dir)
    }

    fn commit_count(&self, dir: &Path) -> Result<u64> {
        crate::git::commit_count(dir)
    }

    fn short_hash(&self, dir: &Path) -> Result<String> {
        crate::git::short_hash(dir)
    }

    fn dirty_state(&self, dir: &Path) -> Result<Option<String>> {
        crate::git::dirty_digest(dir)
    }

    fn is_repository(&self, dir: &Path) -> bool {
        crate::git::is_repository(dir)
    }
}

/// The workspace of one build run
pub struct WorkspaceManager {
    root: PathBuf,
    git_ops: Box<dyn GitOperations>,
}

impl WorkspaceManager {
    /// Workspace at `root` using the system `git`.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            git_ops: Box::new(DefaultGitOperations),
        }
    }

    /// Workspace with a custom `GitOperations` implementation.
    pub fn with_operations(root: PathBuf, git_ops: Box<dyn GitOperations>) -> Self {
        Self { root, git_ops }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn git(&self) -> &dyn GitOperations {
        self.git_ops.as_ref()
    }

    /// A workspace is new until its `projects/` directory exists.
    pub fn is_new(&self) -> bool {
        !self.root.join(defaults::PROJECTS_DIR).is_dir()
    }

    pub fn state_path(&self) -> PathBuf {
        defaults::build_state_path(&self.root)
    }

    pub fn repository_path(&self) -> PathBuf {
        defaults::build_repository_path(&self.root)
    }

    pub fn project_paths(&self, name: &str) -> ProjectPaths {
        ProjectPaths::new(&self.root, name)
    }

    /// Create the top level directories.
    pub fn prepare_layout(&self) -> Result<()> {
        fs::create_dir_all(self.root.join(defaults::PROJECTS_DIR))?;
        fs::create_dir_all(self.repository_path())?;
        Ok(())
    }

    /// Clone or update `url` into `dir`, check out `ref_name` and return the
    /// commit id of the result.
    pub fn sync_checkout(&self, url: &str, ref_name: &str, dir: &Path) -> Result<String> {
        if dir.exists() && !self.git_ops.is_repository(dir) {
            warn!(
                "{} exists but is not a git checkout; cloning again",
                dir.display()
            );
            fs::remove_dir_all(dir)?;
        }

        if dir.exists() {
            debug!("Updating existing clone {}", dir.display());
            self.git_ops.update(url, dir)?;
        } else {
            info!("Cloning {} into {}", url, dir.display());
            self.git_ops.clone_repository(url, ref_name, dir)?;
        }

        self.git_ops
            .checkout(dir, ref_name)
            .map_err(|e| Error::GitClone {
                url: url.to_string(),
                r#ref: ref_name.to_string(),
                message: format!("could not check out branch, tag or commit: {}", e),
            })?;

        let commit = self.git_ops.head_commit(dir)?;
        info!("{} at {} ({})", url, ref_name, commit);
        Ok(commit)
    }

    /// Bring a project's sources up to date.
    ///
    /// Returns the current commit id, or `None` for local sources without
    /// git metadata.
    pub fn sync_project(&self, project: &Project) -> Result<Option<String>> {
        match &project.source {
            ProjectSource::Git { url, r#ref } => {
                let paths = self.project_paths(&project.name);
                fs::create_dir_all(&paths.root)?;
                self.sync_checkout(url, r#ref, &paths.checkout).map(Some)
            }
            ProjectSource::Local { directory } => {
                if !directory.is_dir() {
                    return Err(Error::Spec {
                        path: directory.clone(),
                        message: "source directory does not exist".to_string(),
                    });
                }
                if self.git_ops.is_repository(directory) {
                    self.git_ops.head_commit(directory).map(Some)
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Bring the mock settings checkout up to date; returns its commit.
    pub fn sync_mock_settings(&self, settings: &MockSettings) -> Result<String> {
        let dir = defaults::mock_settings_checkout(&self.root);
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent)?;
        }
        self.sync_checkout(&settings.url, &settings.r#ref, &dir)
    }

    /// Remove project directories whose project is no longer configured.
    ///
    /// Returns the removed project names, sorted.
    pub fn remove_obsolete_projects(&self, configured: &[&str]) -> Result<Vec<String>> {
        let projects_dir = self.root.join(defaults::PROJECTS_DIR);
        if !projects_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut removed = Vec::new();
        for entry in fs::read_dir(&projects_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !configured.contains(&name.as_str()) {
                info!("Removing obsolete project directory {}", entry.path().display());
                fs::remove_dir_all(entry.path())?;
                removed.push(name);
            }
        }
        removed.sort();
        Ok(removed)
    }
}
