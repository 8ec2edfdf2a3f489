//! Build history: what was built when.
//!
//! Each run that built something appends one entry to two files in the
//! build repository:
//!
//! - `buildhistory.json`: an object keyed by timestamp, holding the commit
//!   and package files of every project built at that time.
//! - `buildhistory.log`: the same information as indented text.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::info;
use serde::{Deserialize, Serialize};

use crate::defaults::{HISTORY_JSON_FILE, HISTORY_LOG_FILE};
use crate::error::{Error, Result};

/// What one project contributed to a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectHistory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub rpmfiles: Vec<String>,
    pub srpmfiles: Vec<String>,
}

/// Projects built in one run, by name
pub type RunHistory = BTreeMap<String, ProjectHistory>;

/// The history files of a build repository
#[derive(Debug, Clone)]
pub struct BuildHistory {
    json_path: PathBuf,
    log_path: PathBuf,
}

impl BuildHistory {
    pub fn new(repository: &Path) -> Self {
        Self {
            json_path: repository.join(HISTORY_JSON_FILE),
            log_path: repository.join(HISTORY_LOG_FILE),
        }
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Every recorded run, keyed by timestamp.
    pub fn load(&self) -> Result<BTreeMap<String, RunHistory>> {
        if !self.json_path.is_file() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.json_path)?;
        serde_json::from_str(&content).map_err(|e| Error::State {
            path: self.json_path.clone(),
            message: format!("build history is not valid JSON: {}", e),
        })
    }

    /// Append a run to both history files.
    pub fn append(&self, at: DateTime<Local>, run: &RunHistory) -> Result<()> {
        if run.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.json_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let timestamp = at.format("%Y-%m-%d %H:%M:%S%.6f").to_string();

        info!("Writing build history to {}", self.log_path.display());
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        log.write_all(render_log(&timestamp, run).as_bytes())?;

        info!("Writing build history to {}", self.json_path.display());
        let mut history = self.load()?;
        history.insert(timestamp, run.clone());
        let mut json = serde_json::to_string_pretty(&history)?;
        json.push('\n');
        fs::write(&self.json_path, json)?;
        Ok(())
    }
}

fn render_log(timestamp: &str, run: &RunHistory) -> String {
    let mut out = format!("{}\n", timestamp);
    for (project, entry) in run {
        match &entry.commit {
            Some(commit) => out.push_str(&format!("  {}  {}\n", project, commit)),
            None => out.push_str(&format!("  {}\n", project)),
        }
        for file in entry.rpmfiles.iter().chain(entry.srpmfiles.iter()) {
            out.push_str(&format!("    {}\n", file));
        }
    }
    out
}
