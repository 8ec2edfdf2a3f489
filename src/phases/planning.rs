//! Phase 3: Planning
//!
//! Resolves the version of every project and decides whether it needs a
//! build in this run.
//!
//! A project whose fingerprint matches the recorded one is skipped, unless a
//! rebuild is forced. Dirty checkouts carry a digest of their modifications
//! in the fingerprint, so they are skipped until edited again. A checkout
//! whose status cannot be read is always built. With `rebuild_dependents` set, a skipped project is
//! built anyway when one of its dependencies is built in this run; since
//! planning walks the build order, this carries through whole chains.

use std::collections::HashMap;

use log::{debug, info, warn};

use super::ordering::DependencyGraph;
use super::{PlannedProject, PreparedProject};
use crate::change::{self, BuildReason, Decision};
use crate::state::BuildState;
use crate::version;
use crate::workspace::GitOperations;

/// Switches that override change detection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    pub force_rebuild: bool,
    pub rebuild_dependents: bool,
}

/// Execute Phase 3: plan every project of `order`.
pub fn execute(
    prepared: Vec<PreparedProject>,
    order: &[String],
    graph: &DependencyGraph,
    state: &BuildState,
    git: &dyn GitOperations,
    options: PlanOptions,
) -> Vec<PlannedProject> {
    let mut by_name: HashMap<String, PreparedProject> = prepared
        .into_iter()
        .map(|p| (p.name().to_string(), p))
        .collect();

    let mut planned: Vec<PlannedProject> = Vec::with_capacity(order.len());
    for name in order {
        let Some(prepared) = by_name.remove(name) else {
            continue;
        };
        let mut plan = plan_project(prepared, state, git, options.force_rebuild);

        if options.rebuild_dependents && plan.decision == Decision::Skip {
            let deps = graph.dependencies_of(name);
            let rebuilt = planned
                .iter()
                .find(|p| p.decision.needs_build() && deps.contains(p.name()));
            if let Some(dep) = rebuilt {
                plan.decision =
                    Decision::Build(BuildReason::DependencyRebuilt(dep.name().to_string()));
            }
        }

        match &plan.decision {
            Decision::Skip => info!("{} is up to date, version {}", name, plan.version),
            Decision::Build(reason) => info!("{} will be built: {}", name, reason),
        }
        planned.push(plan);
    }
    planned
}

fn plan_project(
    prepared: PreparedProject,
    state: &BuildState,
    git: &dyn GitOperations,
    force: bool,
) -> PlannedProject {
    let dir = prepared.source_dir.clone();
    let versioned = prepared.failure.is_none() && git.is_repository(&dir);

    let version = if prepared.failure.is_none() {
        version::resolve(git, &dir, prepared.project.git_ref())
    } else {
        version::PLACEHOLDER_VERSION.to_string()
    };
    let commit_info = if versioned {
        match (git.commit_count(&dir), git.short_hash(&dir)) {
            (Ok(count), Ok(hash)) => Some((count, hash)),
            _ => None,
        }
    } else {
        None
    };
    let mut status_unavailable = false;
    let dirty = if versioned {
        git.dirty_state(&dir).unwrap_or_else(|e| {
            warn!(
                "Cannot read the status of {}, building {}: {}",
                dir.display(),
                prepared.name(),
                e
            );
            status_unavailable = true;
            None
        })
    } else {
        None
    };
    let fingerprint = change::fingerprint(
        &prepared.project,
        prepared.commit.as_deref(),
        dirty.as_deref(),
    );
    debug!(
        "{}: version {}, fingerprint {:?}",
        prepared.name(),
        version,
        fingerprint
    );

    let decision = if status_unavailable && !force {
        Decision::Build(BuildReason::StatusUnavailable)
    } else {
        change::detect(
            state,
            prepared.name(),
            fingerprint.as_deref(),
            dirty.is_some(),
            force,
        )
    };

    PlannedProject {
        prepared,
        version,
        fingerprint,
        decision,
        commit_info,
    }
}
