//! # Package Repository
//!
//! Built packages are collected in `<workspace>/buildrepository`, one yum
//! repository per mock root:
//!
//! ```text
//! buildrepository/
//! └── epel-7-x86_64/
//!     ├── rpm/    binary packages + repodata
//!     └── srpm/   source packages + repodata
//! ```
//!
//! Later projects build against this repository, so it is refreshed after
//! every successful project build. Metadata generation goes through the
//! [`RepoIndexer`] trait; [`Createrepo`] runs the real `createrepo` tool.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::package;

/// Trait for repository metadata generation - allows mocking in tests
pub trait RepoIndexer: Send + Sync {
    /// (Re)generate the metadata of the repository in `dir`.
    fn index(&self, dir: &Path) -> Result<()>;
}

/// Runs `createrepo --update <dir>`, logging to `<dir>/log.txt`
pub struct Createrepo {
    executable: PathBuf,
}

impl Createrepo {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl Default for Createrepo {
    fn default() -> Self {
        Self::new("createrepo")
    }
}

impl RepoIndexer for Createrepo {
    fn index(&self, dir: &Path) -> Result<()> {
        let fail = |message: String| Error::RepositoryUpdate {
            directory: dir.to_path_buf(),
            message,
        };

        let log = File::create(dir.join("log.txt")).map_err(|e| fail(e.to_string()))?;
        let log_err = log.try_clone().map_err(|e| fail(e.to_string()))?;

        debug!("Running {} --update {}", self.executable.display(), dir.display());
        let status = Command::new(&self.executable)
            .arg("--update")
            .arg(dir)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .status()
            .map_err(|e| fail(format!("{} not available: {}", self.executable.display(), e)))?;

        if !status.success() {
            return Err(fail(format!(
                "createrepo exited with {}, see {}",
                status,
                dir.join("log.txt").display()
            )));
        }
        Ok(())
    }
}

/// The build repository of a workspace
#[derive(Debug, Clone)]
pub struct PackageRepository {
    root: PathBuf,
}

impl PackageRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Binary package directory of a mock root.
    pub fn rpm_dir(&self, mock_root: &str) -> PathBuf {
        self.root.join(mock_root).join("rpm")
    }

    /// Source package directory of a mock root.
    pub fn srpm_dir(&self, mock_root: &str) -> PathBuf {
        self.root.join(mock_root).join("srpm")
    }

    /// True when the binary repository of `mock_root` has metadata.
    pub fn has_metadata(&self, mock_root: &str) -> bool {
        self.rpm_dir(mock_root).join("repodata").is_dir()
    }

    /// Copy packages into the repository of `mock_root`.
    ///
    /// Files are hard linked when possible and copied otherwise; existing
    /// files with the same name are replaced. Returns the stored paths.
    pub fn store(&self, mock_root: &str, packages: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let rpm_dir = self.rpm_dir(mock_root);
        let srpm_dir = self.srpm_dir(mock_root);
        fs::create_dir_all(&rpm_dir)?;
        fs::create_dir_all(&srpm_dir)?;

        let mut stored = Vec::new();
        for source in packages {
            let Some(file_name) = source.file_name() else {
                continue;
            };
            let target_dir = if package::is_source_package(source) {
                &srpm_dir
            } else {
                &rpm_dir
            };
            let target = target_dir.join(file_name);
            if target.exists() {
                fs::remove_file(&target)?;
            }
            if fs::hard_link(source, &target).is_err() {
                fs::copy(source, &target)?;
            }
            debug!("Stored {}", target.display());
            stored.push(target);
        }
        Ok(stored)
    }

    /// Regenerate metadata of both repositories of `mock_root`.
    pub fn refresh(&self, mock_root: &str, indexer: &dyn RepoIndexer) -> Result<()> {
        for dir in [self.rpm_dir(mock_root), self.srpm_dir(mock_root)] {
            fs::create_dir_all(&dir)?;
            info!("Updating repository metadata of {}", dir.display());
            indexer.index(&dir)?;
        }
        Ok(())
    }

    /// Store packages and refresh metadata.
    ///
    /// A metadata failure is logged as a warning and returned to the caller,
    /// the packages stay stored.
    pub fn publish(
        &self,
        mock_root: &str,
        packages: &[PathBuf],
        indexer: &dyn RepoIndexer,
    ) -> Result<(Vec<PathBuf>, Option<Error>)> {
        let stored = self.store(mock_root, packages)?;
        match self.refresh(mock_root, indexer) {
            Ok(()) => Ok((stored, None)),
            Err(e) => {
                warn!("{}", e);
                Ok((stored, Some(e)))
            }
        }
    }
}
