//! Change detection: should a project be built in this run?
//!
//! A project's fingerprint identifies the sources it would be built from:
//! `<url>#<commit>` for git projects and `<commit>` for local checkouts.
//! Local modifications append `+dirty.<digest>`, so an edited checkout is
//! built once and then skipped until it is edited again.
//! A project whose fingerprint equals the recorded one is skipped unless the
//! user forces a rebuild or one of its dependencies is rebuilt with
//! `--rebuild-dependents`.

use std::fmt;

use crate::project::{Project, ProjectSource};
use crate::state::BuildState;

/// Build fingerprint of a project at `commit`, with the digest of its local
/// modifications when the checkout is dirty.
///
/// Returns `None` when the sources carry no git metadata.
pub fn fingerprint(
    project: &Project,
    commit: Option<&str>,
    dirty: Option<&str>,
) -> Option<String> {
    let commit = commit?;
    let mut fingerprint = match &project.source {
        ProjectSource::Git { url, .. } => format!("{}#{}", url, commit),
        ProjectSource::Local { .. } => commit.to_string(),
    };
    if let Some(digest) = dirty {
        fingerprint.push_str("+dirty.");
        fingerprint.push_str(digest);
    }
    Some(fingerprint)
}

/// Why a project is going to be built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildReason {
    NoPreviousBuild,
    FingerprintChanged,
    DirtyCheckout,
    NotVersioned,
    StatusUnavailable,
    Forced,
    DependencyRebuilt(String),
}

impl fmt::Display for BuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildReason::NoPreviousBuild => write!(f, "no previous build"),
            BuildReason::FingerprintChanged => write!(f, "sources changed"),
            BuildReason::DirtyCheckout => write!(f, "checkout has local modifications"),
            BuildReason::NotVersioned => write!(f, "sources are not under version control"),
            BuildReason::StatusUnavailable => write!(f, "checkout status could not be read"),
            BuildReason::Forced => write!(f, "rebuild forced"),
            BuildReason::DependencyRebuilt(dep) => write!(f, "dependency {} is rebuilt", dep),
        }
    }
}

/// Outcome of change detection for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Build(BuildReason),
}

impl Decision {
    pub fn needs_build(&self) -> bool {
        matches!(self, Decision::Build(_))
    }
}

/// Compare a project's current fingerprint with the recorded one.
///
/// `dirty` only picks the reason reported for a changed fingerprint.
pub fn detect(
    state: &BuildState,
    project: &str,
    fingerprint: Option<&str>,
    dirty: bool,
    force: bool,
) -> Decision {
    if force {
        return Decision::Build(BuildReason::Forced);
    }
    let Some(current) = fingerprint else {
        return Decision::Build(BuildReason::NotVersioned);
    };
    match state.fingerprint(project) {
        None => Decision::Build(BuildReason::NoPreviousBuild),
        Some(recorded) if recorded == current => Decision::Skip,
        Some(_) if dirty => Decision::Build(BuildReason::DirtyCheckout),
        Some(_) => Decision::Build(BuildReason::FingerprintChanged),
    }
}
