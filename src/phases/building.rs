//! Phase 4: Building
//!
//! Builds the planned projects strictly in build order, one at a time.
//!
//! ## Process
//!
//! For each project:
//! 1.  A project whose preparation failed is reported as failed.
//! 2.  A project depending, directly or not, on a failed project is not
//!     built and is reported as blocked by dependency failure.
//! 3.  A project planned to be skipped is reported as skipped.
//! 4.  Otherwise the builder runs. On success the build state records the
//!     new fingerprint and is saved right away, so an interrupted run keeps
//!     what it achieved. On failure nothing is recorded.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use super::ordering::DependencyGraph;
use super::{BuiltPackages, PlannedProject, ProjectOutcome, ProjectStatus};
use crate::builder::{BuildRequest, Builder};
use crate::change::Decision;
use crate::error::{Error, Result};
use crate::state::{BuildRecord, BuildState};

/// Outcomes and warnings of Phase 4
#[derive(Debug, Default)]
pub struct BuildResults {
    pub outcomes: Vec<ProjectOutcome>,
    pub warnings: Vec<String>,
}

/// Execute Phase 4: build every planned project in order.
///
/// Only a failure to save the build state aborts the phase.
pub fn execute(
    planned: &[PlannedProject],
    graph: &DependencyGraph,
    builder: &Builder<'_>,
    state: &mut BuildState,
    state_path: &Path,
) -> Result<BuildResults> {
    let mut results = BuildResults::default();
    let mut unusable: BTreeSet<String> = BTreeSet::new();

    for plan in planned {
        let name = plan.name();
        let outcome = |status: ProjectStatus| ProjectOutcome {
            name: name.to_string(),
            status,
            reason: plan.reason().cloned(),
            commit: plan.prepared.commit.clone(),
        };

        if let Some(failure) = &plan.prepared.failure {
            error!("{} failed: {}", name, failure);
            unusable.insert(name.to_string());
            results
                .outcomes
                .push(outcome(ProjectStatus::Failed(failure.clone())));
            continue;
        }

        let failed_deps: Vec<String> = unusable
            .iter()
            .filter(|dep| graph.dependents_of(dep).contains(name))
            .cloned()
            .collect();
        if !failed_deps.is_empty() {
            let message = format!("blocked by dependency failure: {}", failed_deps.join(", "));
            warn!("{} {}", name, message);
            unusable.insert(name.to_string());
            results.outcomes.push(outcome(ProjectStatus::Blocked(message)));
            continue;
        }

        if plan.decision == Decision::Skip {
            results.outcomes.push(outcome(ProjectStatus::Skipped));
            continue;
        }

        match build_one(plan, builder) {
            Ok((packages, warnings)) => {
                if let Some(fingerprint) = &plan.fingerprint {
                    state.record(name, record(plan, fingerprint, &packages.version));
                    state.save(state_path)?;
                }
                info!(
                    "{} built: {} packages, version {}",
                    name,
                    packages.rpms.len() + packages.srpms.len(),
                    packages.version
                );
                results.warnings.extend(warnings);
                results.outcomes.push(outcome(ProjectStatus::Built(packages)));
            }
            Err(e) => {
                error!("{}", e);
                unusable.insert(name.to_string());
                results
                    .outcomes
                    .push(outcome(ProjectStatus::Failed(e.to_string())));
            }
        }
    }
    Ok(results)
}

fn build_one(plan: &PlannedProject, builder: &Builder<'_>) -> Result<(BuiltPackages, Vec<String>)> {
    let prepared = &plan.prepared;
    let (Some(spec_path), Some(spec)) = (&prepared.spec_path, &prepared.spec) else {
        return Err(Error::Spec {
            path: prepared.source_dir.clone(),
            message: "spec file was not read".to_string(),
        });
    };
    let output = builder.build(&BuildRequest {
        project: prepared.name(),
        source_dir: &prepared.source_dir,
        spec_path,
        spec,
        version: &plan.version,
        commit: plan.commit_info.clone(),
    })?;
    let packages = BuiltPackages {
        version: output.version,
        release: output.release,
        rpms: file_names(&output.rpms),
        srpms: file_names(&output.srpms),
    };
    Ok((packages, output.warnings))
}

fn record(plan: &PlannedProject, fingerprint: &str, version: &str) -> BuildRecord {
    let project = &plan.prepared.project;
    BuildRecord {
        fingerprint: fingerprint.to_string(),
        version: version.to_string(),
        url: project.url(),
        r#ref: project.git_ref().map(String::from),
        spec: project.spec.clone(),
        commit: plan.prepared.commit.clone(),
    }
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .collect()
}
