//! Persisted build state.
//!
//! The state remembers, per project, the fingerprint and version of its last
//! successful build, plus the mock settings commit used for it. It is stored
//! as pretty JSON in `<workspace>/buildstate.json`:
//!
//! ```json
//! {
//!   "projects": {
//!     "helloworld": {
//!       "fingerprint": "https://git.example.com/helloworld.git#ad96bc2...",
//!       "version": "1.0.c2.gad96bc2",
//!       "url": "https://git.example.com/helloworld.git",
//!       "ref": "master",
//!       "commit": "ad96bc2..."
//!     }
//!   },
//!   "mock_settings_commit": "5f0c..."
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What was recorded for one successfully built project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Identity of the sources that were built.
    pub fingerprint: String,
    pub version: String,
    pub url: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// Build state of a workspace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    #[serde(default)]
    pub projects: BTreeMap<String, BuildRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_settings_commit: Option<String>,
}

impl BuildState {
    /// Load the state; a missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No build state at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| Error::State {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| Error::State {
            path: path.to_path_buf(),
            message: format!("corrupt state file: {}", e),
        })
    }

    /// Write the state through a temporary file so a crash never leaves a
    /// truncated file behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let fail = |e: std::io::Error| Error::State {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(fail)?;
        }
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, content + "\n").map_err(fail)?;
        fs::rename(&tmp, path).map_err(fail)?;
        debug!("Saved build state to {}", path.display());
        Ok(())
    }

    pub fn get(&self, project: &str) -> Option<&BuildRecord> {
        self.projects.get(project)
    }

    pub fn fingerprint(&self, project: &str) -> Option<&str> {
        self.get(project).map(|r| r.fingerprint.as_str())
    }

    pub fn record(&mut self, project: &str, record: BuildRecord) {
        self.projects.insert(project.to_string(), record);
    }

    /// Drop records of projects not in `configured`; returns the dropped names.
    pub fn prune(&mut self, configured: &[&str]) -> Vec<String> {
        let obsolete: Vec<String> = self
            .projects
            .keys()
            .filter(|name| !configured.contains(&name.as_str()))
            .cloned()
            .collect();
        for name in &obsolete {
            self.projects.remove(name);
        }
        obsolete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(fingerprint: &str) -> BuildRecord {
        BuildRecord {
            fingerprint: fingerprint.to_string(),
            version: "1.0".to_string(),
            url: "https://git.example.com/a.git".to_string(),
            r#ref: Some("master".to_string()),
            spec: None,
            commit: Some("abc".to_string()),
        }
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let temp = TempDir::new().unwrap();
        let state = BuildState::load(&temp.path().join("buildstate.json")).unwrap();
        assert!(state.projects.is_empty());
        assert_eq!(state.mock_settings_commit, None);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("buildstate.json");
        let mut state = BuildState::default();
        state.record("a", record("url#abc"));
        state.mock_settings_commit = Some("5f0c".to_string());
        state.save(&path).unwrap();

        assert!(!temp.path().join("buildstate.json.tmp").exists());
        let loaded = BuildState::load(&path).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.fingerprint("a"), Some("url#abc"));
        assert_eq!(loaded.fingerprint("b"), None);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"ref\": \"master\""));
        assert!(!raw.contains("\"spec\""));
    }

    #[test]
    fn test_corrupt_file_is_state_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("buildstate.json");
        fs::write(&path, "{ not json").unwrap();
        let err = BuildState::load(&path).unwrap_err();
        assert!(matches!(err, Error::State { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_prune() {
        let mut state = BuildState::default();
        state.record("a", record("1"));
        state.record("b", record("2"));
        state.record("c", record("3"));
        let dropped = state.prune(&["b"]);
        assert_eq!(dropped, vec!["a", "c"]);
        assert_eq!(state.projects.len(), 1);
        assert!(state.get("b").is_some());
    }
}
