//! Projects and their place in the workspace.

use std::path::{Path, PathBuf};

use crate::config::{BuildConfig, ProjectConfig};

/// Where a project's sources come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSource {
    /// A git repository cloned into the workspace.
    Git { url: String, r#ref: String },
    /// A directory on the local filesystem, built in place.
    Local { directory: PathBuf },
}

/// A single buildable project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Unique key; also the directory name under `projects/`.
    pub name: String,
    pub source: ProjectSource,
    /// Spec file name, relative to the source root.
    pub spec: Option<String>,
    pub enabled: bool,
}

impl Project {
    pub fn git(name: impl Into<String>, url: impl Into<String>, r#ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ProjectSource::Git {
                url: url.into(),
                r#ref: r#ref.into(),
            },
            spec: None,
            enabled: true,
        }
    }

    pub fn local(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: ProjectSource::Local {
                directory: directory.into(),
            },
            spec: None,
            enabled: true,
        }
    }

    pub fn with_spec(mut self, spec: impl Into<String>) -> Self {
        self.spec = Some(spec.into());
        self
    }

    /// URL recorded in the build state; local projects record their path.
    pub fn url(&self) -> String {
        match &self.source {
            ProjectSource::Git { url, .. } => url.clone(),
            ProjectSource::Local { directory } => directory.display().to_string(),
        }
    }

    /// Configured ref; local projects have none.
    pub fn git_ref(&self) -> Option<&str> {
        match &self.source {
            ProjectSource::Git { r#ref, .. } => Some(r#ref),
            ProjectSource::Local { .. } => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, ProjectSource::Local { .. })
    }

    /// Directory holding the project's sources for this workspace.
    pub fn source_dir(&self, workspace: &Path) -> PathBuf {
        match &self.source {
            ProjectSource::Git { .. } => ProjectPaths::new(workspace, &self.name).checkout,
            ProjectSource::Local { directory } => directory.clone(),
        }
    }
}

impl From<&ProjectConfig> for Project {
    fn from(config: &ProjectConfig) -> Self {
        Self {
            name: config.name.clone(),
            source: ProjectSource::Git {
                url: config.url.clone(),
                r#ref: config.r#ref.clone(),
            },
            spec: config.spec.clone(),
            enabled: config.enabled,
        }
    }
}

/// Enabled projects of a configuration, in configuration order.
pub fn from_config(config: &BuildConfig) -> Vec<Project> {
    config.enabled_projects().map(Project::from).collect()
}

/// Per-project directories under `<workspace>/projects/<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub checkout: PathBuf,
    /// Patched spec files.
    pub spec: PathBuf,
    /// Sources handed to mock.
    pub sources: PathBuf,
    /// Source rpm result directory.
    pub srpm: PathBuf,
    /// Binary rpm result directories live below this, one per root.
    pub rpm: PathBuf,
}

impl ProjectPaths {
    pub fn new(workspace: &Path, name: &str) -> Self {
        let root = workspace.join(crate::defaults::PROJECTS_DIR).join(name);
        let rpmbuild = root.join("rpmbuild");
        Self {
            checkout: root.join("checkout"),
            spec: rpmbuild.join("spec"),
            sources: rpmbuild.join("sources"),
            srpm: rpmbuild.join("srpm"),
            rpm: rpmbuild.join("rpm"),
            root,
        }
    }

    /// Binary rpm result directory for one mock root.
    pub fn rpm_for_root(&self, root: &str) -> PathBuf {
        self.rpm.join(root)
    }

    /// Source rpm result directory for one mock root.
    pub fn srpm_for_root(&self, root: &str) -> PathBuf {
        self.srpm.join(root)
    }
}
