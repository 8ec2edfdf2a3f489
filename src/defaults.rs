//! Default values and workspace layout names.
//!
//! This module provides centralized names for the workspace layout and the
//! default locations used across commands, ensuring consistency and avoiding
//! duplication.

use std::path::{Path, PathBuf};

/// Directory holding one subdirectory per project.
pub const PROJECTS_DIR: &str = "projects";

/// Directory holding the mock settings checkout.
pub const MOCK_SETTINGS_DIR: &str = "mocksettings";

/// Directory holding the produced package repositories.
pub const BUILD_REPOSITORY_DIR: &str = "buildrepository";

/// Persisted build state, relative to the workspace.
pub const BUILD_STATE_FILE: &str = "buildstate.json";

/// Build history files, relative to the build repository.
pub const HISTORY_JSON_FILE: &str = "buildhistory.json";
pub const HISTORY_LOG_FILE: &str = "buildhistory.log";

/// Log file written by mock into each result directory.
pub const MOCK_LOG_FILE: &str = "mock.log";

/// Environment variable seeding the release number on CI.
pub const BUILD_NUMBER_ENV: &str = "BUILD_NUMBER";

/// Returns the default mock configuration file.
///
/// Uses the platform configuration directory:
/// - Linux: `~/.config/rpmbuilder/mock/default.cfg`
///
/// Falls back to `.rpmbuilder/mock/default.cfg` in the current directory if
/// the platform configuration directory cannot be determined.
///
/// This can be overridden by the `--mockconf` CLI flag or the
/// `RPMBUILDER_MOCKCONF` environment variable.
pub fn default_mock_config() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".rpmbuilder"))
        .join("rpmbuilder")
        .join("mock")
        .join("default.cfg")
}

/// `<workspace>/buildstate.json`
pub fn build_state_path(workspace: &Path) -> PathBuf {
    workspace.join(BUILD_STATE_FILE)
}

/// `<workspace>/buildrepository`
pub fn build_repository_path(workspace: &Path) -> PathBuf {
    workspace.join(BUILD_REPOSITORY_DIR)
}

/// `<workspace>/mocksettings/checkout`
pub fn mock_settings_checkout(workspace: &Path) -> PathBuf {
    workspace.join(MOCK_SETTINGS_DIR).join("checkout")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mock_config_path() {
        let path = default_mock_config();
        assert!(path.ends_with("rpmbuilder/mock/default.cfg"));
    }

    #[test]
    fn test_default_mock_config_is_absolute_or_fallback() {
        let path = default_mock_config();
        // Either absolute (normal case) or relative fallback
        assert!(
            path.is_absolute() || path.starts_with(".rpmbuilder"),
            "Expected absolute path or fallback, got: {:?}",
            path
        );
    }

    #[test]
    fn test_workspace_paths() {
        let ws = Path::new("/ws");
        assert_eq!(build_state_path(ws), PathBuf::from("/ws/buildstate.json"));
        assert_eq!(
            build_repository_path(ws),
            PathBuf::from("/ws/buildrepository")
        );
        assert_eq!(
            mock_settings_checkout(ws),
            PathBuf::from("/ws/mocksettings/checkout")
        );
    }
}
