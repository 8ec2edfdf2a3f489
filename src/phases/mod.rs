//! Implementation of the 5 phases of a build run.
//!
//! ## Overview
//!
//! A build run follows 5 phases:
//! 1. Checkout - Clone or update every project and read its spec file
//! 2. Ordering - Order projects so that dependencies build first
//! 3. Planning - Resolve versions and decide which projects need a build
//! 4. Building - Build the planned projects in order, blocking dependents of failures
//! 5. Finalize - Write build history, persist state, push the remote backup
//!
//! Workspace preparation (remote restore, mock settings, obsolete project
//! cleanup) happens in the orchestrator before Phase 1.
//!
//! Each phase depends only on the previous phases and the foundation modules.

use std::path::PathBuf;

use crate::change::{BuildReason, Decision};
use crate::project::Project;
use crate::spec::SpecFile;

// Phase modules
pub mod building;
pub mod checkout;
pub mod finalize;
pub mod orchestrator;
pub mod ordering;
pub mod planning;

// Re-export phase modules by position in the pipeline
pub use building as phase4;
pub use checkout as phase1;
pub use finalize as phase5;
pub use ordering as phase2;
pub use planning as phase3;

/// A project after Phase 1: sources in place, spec read
///
/// Phase 1 returns projects in configuration order; Phase 2 relies on that
/// order to break ties.
#[derive(Debug, Clone)]
pub struct PreparedProject {
    pub project: Project,
    pub source_dir: PathBuf,
    /// Commit of the sources, `None` when they are not under git.
    pub commit: Option<String>,
    pub spec_path: Option<PathBuf>,
    pub spec: Option<SpecFile>,
    /// Why the sources or spec could not be prepared.
    pub failure: Option<String>,
}

impl PreparedProject {
    pub fn name(&self) -> &str {
        &self.project.name
    }

    /// Packages this project produces. Without a readable spec the project
    /// is assumed to produce a package named after itself.
    pub fn provides(&self) -> Vec<String> {
        match &self.spec {
            Some(spec) => spec.packages.clone(),
            None => vec![self.project.name.clone()],
        }
    }

    /// Package names this project requires, build and runtime.
    pub fn requires(&self) -> Vec<String> {
        match &self.spec {
            Some(spec) => spec.dependencies().into_iter().map(String::from).collect(),
            None => Vec::new(),
        }
    }
}

/// A project after Phase 3
#[derive(Debug, Clone)]
pub struct PlannedProject {
    pub prepared: PreparedProject,
    pub version: String,
    pub fingerprint: Option<String>,
    pub decision: Decision,
    /// Commit count and abbreviated hash for the git release macros.
    pub commit_info: Option<(u64, String)>,
}

impl PlannedProject {
    pub fn name(&self) -> &str {
        self.prepared.name()
    }

    pub fn reason(&self) -> Option<&BuildReason> {
        match &self.decision {
            Decision::Build(reason) => Some(reason),
            Decision::Skip => None,
        }
    }
}

/// Packages produced by a successful project build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltPackages {
    pub version: String,
    pub release: String,
    pub rpms: Vec<String>,
    pub srpms: Vec<String>,
}

/// What happened to a project in this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectStatus {
    Built(BuiltPackages),
    /// Unchanged since the last successful build.
    Skipped,
    Failed(String),
    /// Not built because a dependency failed.
    Blocked(String),
}

/// The outcome of one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectOutcome {
    pub name: String,
    pub status: ProjectStatus,
    pub reason: Option<BuildReason>,
    pub commit: Option<String>,
}

/// The result of a build run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Build order chosen by Phase 2.
    pub order: Vec<String>,
    /// One outcome per project, in build order.
    pub outcomes: Vec<ProjectOutcome>,
    /// Non-fatal problems, such as failed repository metadata updates.
    pub warnings: Vec<String>,
    /// Project directories removed because the project is gone.
    pub removed: Vec<String>,
    /// Failure pushing the workspace to the backup host.
    pub backup_error: Option<String>,
}

impl RunReport {
    fn with_status(&self, keep: fn(&ProjectStatus) -> bool) -> Vec<&ProjectOutcome> {
        self.outcomes.iter().filter(|o| keep(&o.status)).collect()
    }

    pub fn built(&self) -> Vec<&ProjectOutcome> {
        self.with_status(|s| matches!(s, ProjectStatus::Built(_)))
    }

    pub fn skipped(&self) -> Vec<&ProjectOutcome> {
        self.with_status(|s| matches!(s, ProjectStatus::Skipped))
    }

    pub fn failed(&self) -> Vec<&ProjectOutcome> {
        self.with_status(|s| matches!(s, ProjectStatus::Failed(_)))
    }

    pub fn blocked(&self) -> Vec<&ProjectOutcome> {
        self.with_status(|s| matches!(s, ProjectStatus::Blocked(_)))
    }

    /// True when every project was built or skipped and the backup push,
    /// if any, worked.
    pub fn success(&self) -> bool {
        self.failed().is_empty() && self.blocked().is_empty() && self.backup_error.is_none()
    }
}
