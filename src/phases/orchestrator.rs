//! Orchestrator for a complete build run
//!
//! This module coordinates all phases to provide a clean API for a build
//! run. Before Phase 1 it prepares the workspace:
//!
//! 1. Restore a new workspace from the backup host, when one is configured
//! 2. Create the workspace layout
//! 3. Remove project directories and state records of projects that are gone
//! 4. Set up the mock environment, from the mock settings repository or a
//!    local mock configuration file
//!
//! It then runs Phases 1-5 and returns the run report.

use std::path::PathBuf;

use log::{info, warn};

use super::planning::PlanOptions;
use super::{phase1, phase2, phase3, phase4, phase5, RunReport};
use crate::backup::{BackupTransport, RemoteFunction};
use crate::builder::Builder;
use crate::config::{BackupSettings, MockSettings};
use crate::defaults;
use crate::error::Result;
use crate::mock::{BuildTools, MockEnvironment, MockOptions};
use crate::project::Project;
use crate::repository::{PackageRepository, RepoIndexer};
use crate::state::BuildState;
use crate::workspace::WorkspaceManager;

/// Where the mock configuration comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockSource {
    /// A git repository with `etc/mock/<root>.cfg` files.
    Settings(MockSettings),
    /// A single local mock configuration file.
    File(PathBuf),
}

/// Everything that shapes a build run besides the projects
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mock_source: MockSource,
    pub mock: MockOptions,
    pub plan: PlanOptions,
    pub backup: Option<BackupSettings>,
    pub remote_function: RemoteFunction,
}

/// The external tools a run drives
pub struct Toolchain<'a> {
    pub build: &'a dyn BuildTools,
    pub indexer: &'a dyn RepoIndexer,
    pub backup: &'a dyn BackupTransport,
}

/// Execute a complete build run of `projects`.
///
/// Only fatal errors are returned: configuration problems, dependency
/// cycles, an unusable build state or a failed backup restore. Per-project
/// failures are part of the report.
pub fn execute_build(
    workspace: &WorkspaceManager,
    projects: &[Project],
    options: &RunOptions,
    tools: &Toolchain<'_>,
) -> Result<RunReport> {
    let mut report = RunReport::default();

    if let Some(backup) = &options.backup {
        if workspace.is_new() {
            tools.backup.restore(backup, workspace.root())?;
        }
    }
    workspace.prepare_layout()?;

    let configured: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
    report.removed = workspace.remove_obsolete_projects(&configured)?;

    let state_path = workspace.state_path();
    let mut state = BuildState::load(&state_path)?;
    let pruned = state.prune(&configured);
    if !pruned.is_empty() {
        info!("Forgetting build state of {}", pruned.join(", "));
        state.save(&state_path)?;
    }

    let (env, mock_commit) = mock_environment(workspace, &options.mock_source, &state)?;
    info!(
        "Building for {} with configuration from {}",
        env.root_names().join(", "),
        env.config_dir.display()
    );
    tools.build.validate()?;

    let enabled: Vec<Project> = projects.iter().filter(|p| p.enabled).cloned().collect();

    // Phase 1: Checkout
    let prepared = phase1::execute(workspace, &enabled);

    // Phase 2: Ordering
    let (graph, order) = phase2::execute(&prepared)?;
    report.order = order.clone();

    // Phase 3: Planning
    let planned = phase3::execute(prepared, &order, &graph, &state, workspace.git(), options.plan);

    // Phase 4: Building
    let repository = PackageRepository::new(workspace.repository_path());
    let builder = Builder::new(
        workspace.root(),
        &env,
        &options.mock,
        tools.build,
        tools.indexer,
        &repository,
    );
    let results = phase4::execute(&planned, &graph, &builder, &mut state, &state_path)?;
    report.outcomes = results.outcomes;
    report.warnings = results.warnings;

    // Phase 5: Finalize
    let push = match &options.backup {
        Some(settings) if options.remote_function.pushes() => Some(phase5::PushTarget {
            settings,
            transport: tools.backup,
        }),
        _ => None,
    };
    phase5::execute(
        &mut report,
        workspace.root(),
        repository.root(),
        &mut state,
        &state_path,
        mock_commit,
        push,
    )?;

    Ok(report)
}

/// Set up the mock environment; returns it with the mock settings commit.
fn mock_environment(
    workspace: &WorkspaceManager,
    source: &MockSource,
    state: &BuildState,
) -> Result<(MockEnvironment, Option<String>)> {
    match source {
        MockSource::File(path) => Ok((MockEnvironment::from_file(path)?, None)),
        MockSource::Settings(settings) => {
            let commit = workspace.sync_mock_settings(settings)?;
            if let Some(previous) = &state.mock_settings_commit {
                if previous != &commit {
                    warn!(
                        "Mock settings changed since the last build ({} -> {}); \
                         use --force-rebuild to rebuild everything with them",
                        previous, commit
                    );
                }
            }
            let checkout = defaults::mock_settings_checkout(workspace.root());
            let env = MockEnvironment::from_checkout(&checkout, &settings.roots)?;
            Ok((env, Some(commit)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tests::{FakeTools, NoopIndexer};
    use crate::error::Error;
    use crate::phases::ProjectStatus;
    use crate::workspace::tests::FakeGit;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct NoBackup;

    impl BackupTransport for NoBackup {
        fn restore(&self, _settings: &BackupSettings, _workspace: &Path) -> Result<bool> {
            Ok(false)
        }

        fn push(&self, _settings: &BackupSettings, _workspace: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn options(mock_cfg: &Path) -> RunOptions {
        RunOptions {
            mock_source: MockSource::File(mock_cfg.to_path_buf()),
            mock: MockOptions {
                unique_ext: "test".to_string(),
                extra_args: vec![],
                init: false,
                scrub: false,
            },
            plan: PlanOptions::default(),
            backup: None,
            remote_function: RemoteFunction::Pull,
        }
    }

    fn local_project(root: &Path, name: &str, requires: Option<&str>) -> Project {
        let dir = root.join("src").join(name);
        fs::create_dir_all(&dir).unwrap();
        let mut spec = format!("Name: {}\nVersion: 1.0\nRelease: 1\n", name);
        if let Some(dep) = requires {
            spec.push_str(&format!("Requires: {}\n", dep));
        }
        fs::write(dir.join(format!("{}.spec", name)), spec).unwrap();
        Project::local(name, dir)
    }

    fn mock_cfg(root: &Path) -> PathBuf {
        let cfg = root.join("epel-7-x86_64.cfg");
        fs::write(&cfg, "config_opts['dist'] = 'el7'\n").unwrap();
        cfg
    }

    #[test]
    fn test_run_orders_and_builds() {
        let temp = TempDir::new().unwrap();
        let projects = vec![
            local_project(temp.path(), "app", Some("lib")),
            local_project(temp.path(), "lib", None),
        ];
        let ws = WorkspaceManager::with_operations(temp.path().join("ws"), Box::new(FakeGit::new()));
        let build = FakeTools::new();
        let calls = build.calls.clone();
        let tools = Toolchain {
            build: &build,
            indexer: &NoopIndexer,
            backup: &NoBackup,
        };

        let report = execute_build(&ws, &projects, &options(&mock_cfg(temp.path())), &tools).unwrap();

        assert_eq!(report.order, vec!["lib", "app"]);
        assert!(report.success());
        assert_eq!(report.built().len(), 2);
        let calls = calls.lock().unwrap();
        assert!(calls[0].starts_with("buildsrpm"));
        assert!(ws.repository_path().join("buildhistory.json").is_file());
    }

    #[test]
    fn test_cycle_aborts_before_building() {
        let temp = TempDir::new().unwrap();
        let projects = vec![
            local_project(temp.path(), "a", Some("b")),
            local_project(temp.path(), "b", Some("a")),
        ];
        let ws = WorkspaceManager::with_operations(temp.path().join("ws"), Box::new(FakeGit::new()));
        let build = FakeTools::new();
        let calls = build.calls.clone();
        let tools = Toolchain {
            build: &build,
            indexer: &NoopIndexer,
            backup: &NoBackup,
        };

        let err = execute_build(&ws, &projects, &options(&mock_cfg(temp.path())), &tools).unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { .. }));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_obsolete_projects_are_removed() {
        let temp = TempDir::new().unwrap();
        let ws = WorkspaceManager::with_operations(temp.path().join("ws"), Box::new(FakeGit::new()));
        fs::create_dir_all(ws.root().join("projects/gone/checkout")).unwrap();
        let projects = vec![local_project(temp.path(), "kept", None)];
        let build = FakeTools::new();
        let tools = Toolchain {
            build: &build,
            indexer: &NoopIndexer,
            backup: &NoBackup,
        };

        let report = execute_build(&ws, &projects, &options(&mock_cfg(temp.path())), &tools).unwrap();
        assert_eq!(report.removed, vec!["gone"]);
        assert!(!ws.root().join("projects/gone").exists());
    }

    #[test]
    fn test_disabled_project_is_not_built() {
        let temp = TempDir::new().unwrap();
        let mut disabled = local_project(temp.path(), "off", None);
        disabled.enabled = false;
        let projects = vec![disabled, local_project(temp.path(), "on", None)];
        let ws = WorkspaceManager::with_operations(temp.path().join("ws"), Box::new(FakeGit::new()));
        let build = FakeTools::new();
        let tools = Toolchain {
            build: &build,
            indexer: &NoopIndexer,
            backup: &NoBackup,
        };

        let report = execute_build(&ws, &projects, &options(&mock_cfg(temp.path())), &tools).unwrap();
        assert_eq!(report.order, vec!["on"]);
        assert!(matches!(report.outcomes[0].status, ProjectStatus::Built(_)));
    }

    #[test]
    fn test_missing_mock_config_is_fatal() {
        let temp = TempDir::new().unwrap();
        let ws = WorkspaceManager::with_operations(temp.path().join("ws"), Box::new(FakeGit::new()));
        let build = FakeTools::new();
        let tools = Toolchain {
            build: &build,
            indexer: &NoopIndexer,
            backup: &NoBackup,
        };
        let err = execute_build(&ws, &[], &options(&temp.path().join("missing.cfg")), &tools)
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
