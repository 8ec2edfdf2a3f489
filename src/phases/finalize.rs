//! Phase 5: Finalize
//!
//! Wraps up a run once every project has been handled:
//!
//! 1.  **History**: projects built in this run are appended to the build
//!     history of the build repository.
//! 2.  **State**: the mock settings commit used by this run is stored, so
//!     the next run can tell whether the build environment changed.
//! 3.  **Backup**: a fully successful run is pushed to the backup host when
//!     requested. A push failure is reported, it does not undo the run.

use std::path::Path;

use chrono::Local;
use log::{error, info};

use super::{ProjectStatus, RunReport};
use crate::backup::BackupTransport;
use crate::config::BackupSettings;
use crate::error::Result;
use crate::history::{BuildHistory, ProjectHistory, RunHistory};
use crate::state::BuildState;

/// Where the run pushes its workspace, if anywhere
pub struct PushTarget<'a> {
    pub settings: &'a BackupSettings,
    pub transport: &'a dyn BackupTransport,
}

/// Execute Phase 5.
pub fn execute(
    report: &mut RunReport,
    workspace: &Path,
    repository: &Path,
    state: &mut BuildState,
    state_path: &Path,
    mock_settings_commit: Option<String>,
    push: Option<PushTarget<'_>>,
) -> Result<()> {
    let run = run_history(report);
    if !run.is_empty() {
        BuildHistory::new(repository).append(Local::now(), &run)?;
    }

    if mock_settings_commit.is_some() && state.mock_settings_commit != mock_settings_commit {
        state.mock_settings_commit = mock_settings_commit;
        state.save(state_path)?;
    }

    if let Some(target) = push {
        if report.success() {
            if let Err(e) = target.transport.push(target.settings, workspace) {
                error!("{}", e);
                report.backup_error = Some(e.to_string());
            }
        } else {
            info!("Not pushing the workspace, the run had failures");
        }
    }
    Ok(())
}

/// History entries of the projects built in a run.
pub fn run_history(report: &RunReport) -> RunHistory {
    report
        .outcomes
        .iter()
        .filter_map(|outcome| match &outcome.status {
            ProjectStatus::Built(packages) => Some((
                outcome.name.clone(),
                ProjectHistory {
                    commit: outcome.commit.clone(),
                    rpmfiles: packages.rpms.clone(),
                    srpmfiles: packages.srpms.clone(),
                },
            )),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::phases::{BuiltPackages, ProjectOutcome};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Mock transport for testing
    struct RecordingTransport {
        pushes: Arc<Mutex<usize>>,
        fail: bool,
    }

    impl BackupTransport for RecordingTransport {
        fn restore(&self, _settings: &BackupSettings, _workspace: &Path) -> Result<bool> {
            Ok(false)
        }

        fn push(&self, settings: &BackupSettings, _workspace: &Path) -> Result<()> {
            *self.pushes.lock().unwrap() += 1;
            if self.fail {
                return Err(Error::Backup {
                    host: settings.remote_host.clone(),
                    message: "push failed with exit code 255".to_string(),
                });
            }
            Ok(())
        }
    }

    fn settings() -> BackupSettings {
        BackupSettings {
            remote_host: "backup".to_string(),
            remote_dir: "/srv".to_string(),
        }
    }

    fn built_report() -> RunReport {
        RunReport {
            outcomes: vec![
                ProjectOutcome {
                    name: "hello".to_string(),
                    status: ProjectStatus::Built(BuiltPackages {
                        version: "1.0".to_string(),
                        release: "1".to_string(),
                        rpms: vec!["hello-1.0-1.x86_64.rpm".to_string()],
                        srpms: vec!["hello-1.0-1.src.rpm".to_string()],
                    }),
                    reason: None,
                    commit: Some("abc".to_string()),
                },
                ProjectOutcome {
                    name: "other".to_string(),
                    status: ProjectStatus::Skipped,
                    reason: None,
                    commit: None,
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_history_and_mock_commit() {
        let temp = TempDir::new().unwrap();
        let repository = temp.path().join("buildrepository");
        let state_path = temp.path().join("buildstate.json");
        let mut state = BuildState::default();
        let mut report = built_report();

        execute(
            &mut report,
            temp.path(),
            &repository,
            &mut state,
            &state_path,
            Some("5f0c".to_string()),
            None,
        )
        .unwrap();

        let history = BuildHistory::new(&repository).load().unwrap();
        assert_eq!(history.len(), 1);
        let run = history.values().next().unwrap();
        assert_eq!(run.keys().collect::<Vec<_>>(), vec!["hello"]);
        assert_eq!(
            BuildState::load(&state_path).unwrap().mock_settings_commit.as_deref(),
            Some("5f0c")
        );
    }

    #[test]
    fn test_push_only_after_success() {
        let temp = TempDir::new().unwrap();
        let pushes = Arc::new(Mutex::new(0));
        let transport = RecordingTransport {
            pushes: pushes.clone(),
            fail: false,
        };
        let settings = settings();
        let mut state = BuildState::default();

        let mut report = built_report();
        report.outcomes[1].status = ProjectStatus::Failed("boom".to_string());
        execute(
            &mut report,
            temp.path(),
            &temp.path().join("buildrepository"),
            &mut state,
            &temp.path().join("buildstate.json"),
            None,
            Some(PushTarget {
                settings: &settings,
                transport: &transport,
            }),
        )
        .unwrap();
        assert_eq!(*pushes.lock().unwrap(), 0);

        let mut report = built_report();
        execute(
            &mut report,
            temp.path(),
            &temp.path().join("buildrepository"),
            &mut state,
            &temp.path().join("buildstate.json"),
            None,
            Some(PushTarget {
                settings: &settings,
                transport: &transport,
            }),
        )
        .unwrap();
        assert_eq!(*pushes.lock().unwrap(), 1);
        assert!(report.success());
    }

    #[test]
    fn test_push_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let transport = RecordingTransport {
            pushes: Arc::new(Mutex::new(0)),
            fail: true,
        };
        let settings = settings();
        let mut report = built_report();
        execute(
            &mut report,
            temp.path(),
            &temp.path().join("buildrepository"),
            &mut BuildState::default(),
            &temp.path().join("buildstate.json"),
            None,
            Some(PushTarget {
                settings: &settings,
                transport: &transport,
            }),
        )
        .unwrap();
        assert!(!report.success());
        assert!(report.backup_error.as_deref().unwrap().contains("255"));
    }
}
