//! Phase 1: Checkout
//!
//! Brings the sources of every enabled project up to date and reads its
//! spec file.
//!
//! ## Process
//!
//! 1.  **Sync**: git projects are cloned or updated under
//!     `projects/<name>/checkout` and detached at their configured ref.
//!     Local projects are used in place.
//! 2.  **Spec**: the spec file is located (the configured one, or the only
//!     `*.spec` at the top of the sources) and parsed.
//!
//! A failure in either step does not stop the run: the project is carried
//! on with its failure recorded, so Phase 2 can still order it and Phase 4
//! reports it and blocks its dependents.

use log::{info, warn};

use super::PreparedProject;
use crate::project::Project;
use crate::spec;
use crate::workspace::WorkspaceManager;

/// Execute Phase 1: sync every project and read its spec.
pub fn execute(workspace: &WorkspaceManager, projects: &[Project]) -> Vec<PreparedProject> {
    projects
        .iter()
        .map(|project| {
            info!("Preparing {}", project.name);
            let mut prepared = blank(workspace, project);
            match workspace.sync_project(project) {
                Ok(commit) => {
                    prepared.commit = commit;
                    read_spec(&mut prepared);
                }
                Err(e) => {
                    warn!("Cannot prepare {}: {}", project.name, e);
                    prepared.failure = Some(e.to_string());
                }
            }
            prepared
        })
        .collect()
}

/// Read specs from sources already in the workspace, without touching git.
pub fn inspect(workspace: &WorkspaceManager, projects: &[Project]) -> Vec<PreparedProject> {
    projects
        .iter()
        .map(|project| {
            let mut prepared = blank(workspace, project);
            if prepared.source_dir.is_dir() {
                read_spec(&mut prepared);
            } else {
                prepared.failure = Some(format!(
                    "no sources at {}, run a build first",
                    prepared.source_dir.display()
                ));
            }
            prepared
        })
        .collect()
}

fn blank(workspace: &WorkspaceManager, project: &Project) -> PreparedProject {
    PreparedProject {
        project: project.clone(),
        source_dir: project.source_dir(workspace.root()),
        commit: None,
        spec_path: None,
        spec: None,
        failure: None,
    }
}

fn read_spec(prepared: &mut PreparedProject) {
    let located = spec::locate(&prepared.source_dir, prepared.project.spec.as_deref());
    let result = located.and_then(|path| spec::from_file(&path).map(|parsed| (path, parsed)));
    match result {
        Ok((path, parsed)) => {
            prepared.spec_path = Some(path);
            prepared.spec = Some(parsed);
        }
        Err(e) => {
            warn!("Cannot read spec of {}: {}", prepared.project.name, e);
            prepared.failure = Some(e.to_string());
        }
    }
}
