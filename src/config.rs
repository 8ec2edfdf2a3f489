//! # Build Configuration
//!
//! This module defines the data structures for the INI build configuration
//! and the logic for loading them. Parsing of the INI syntax itself is done by
//! `rust-ini`; this module validates the sections and turns them into typed
//! settings.
//!
//! ## Format
//!
//! ```ini
//! [helloworld]
//! type = project
//! url = https://git.example.com/helloworld.git
//! ref = master
//! spec = helloworld.spec   ; optional
//! enabled = true           ; optional, defaults to true
//!
//! [mock]
//! url = https://git.example.com/mock-settings.git
//! ref = master
//! roots = epel-7-x86_64, fedora-39-x86_64
//!
//! [sshbackup]
//! remotehost = builder@backup.example.com
//! remotedir = /srv/rpmbuilder
//! ```
//!
//! Section names become directory names in the workspace, so they must only
//! contain alphanumeric characters and dashes. The order of project sections
//! is preserved and later used to break ties in the build order.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use ini::{Ini, Properties};
use log::debug;
use regex::Regex;

use crate::error::{Error, Result};

/// Name of the section holding the mock settings repository.
pub const MOCK_SECTION: &str = "mock";

/// Name of the section holding the remote backup host.
pub const BACKUP_SECTION: &str = "sshbackup";

/// Value of the `type` field marking a project section.
pub const PROJECT_TYPE: &str = "project";

/// A project section of the build configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Section name, used as the project name.
    pub name: String,
    /// Git URL to clone the project from.
    pub url: String,
    /// Branch, tag or commit to build.
    pub r#ref: String,
    /// Spec file name inside the checkout, if the project has several.
    pub spec: Option<String>,
    /// Disabled projects are parsed but never built.
    pub enabled: bool,
}

/// The `[mock]` section: where the mock configuration comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockSettings {
    pub url: String,
    pub r#ref: String,
    /// Mock root names (file stems of `etc/mock/<root>.cfg`).
    pub roots: Vec<String>,
}

/// The `[sshbackup]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSettings {
    pub remote_host: String,
    pub remote_dir: String,
}

/// Complete build configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfig {
    /// Project sections in file order.
    pub projects: Vec<ProjectConfig>,
    pub mock: Option<MockSettings>,
    pub backup: Option<BackupSettings>,
}

impl BuildConfig {
    /// Projects with `enabled` set, in configuration order.
    pub fn enabled_projects(&self) -> impl Iterator<Item = &ProjectConfig> {
        self.projects.iter().filter(|p| p.enabled)
    }
}

/// Load and validate a build configuration file.
pub fn from_file(path: &Path) -> Result<BuildConfig> {
    let content = fs::read_to_string(path).map_err(|e| Error::ConfigParse {
        message: format!("Failed to open configuration file {}: {}", path.display(), e),
        hint: None,
    })?;
    parse(&content)
}

/// Parse a build configuration from INI text.
pub fn parse(content: &str) -> Result<BuildConfig> {
    let ini = Ini::load_from_str(content).map_err(|e| Error::config(e.to_string()))?;

    let section_name = Regex::new(r"^[A-Za-z0-9-]+$")?;
    let mut config = BuildConfig::default();
    let mut seen = HashSet::new();

    for (section, props) in ini.iter() {
        let Some(section) = section else {
            if props.iter().next().is_some() {
                return Err(Error::ConfigParse {
                    message: "Options found before the first section header".to_string(),
                    hint: Some("Start the file with a [section] line".to_string()),
                });
            }
            continue;
        };

        if !section_name.is_match(section) {
            return Err(Error::ConfigParse {
                message: format!("Section [{}] name contains illegal characters", section),
                hint: Some("Use only alphanumeric characters and dashes".to_string()),
            });
        }
        if !seen.insert(section.to_string()) {
            return Err(Error::config(format!(
                "Section [{}] is defined more than once",
                section
            )));
        }

        match section {
            MOCK_SECTION => config.mock = Some(parse_mock(props)?),
            BACKUP_SECTION => config.backup = Some(parse_backup(props)?),
            _ => match props.get("type") {
                Some(PROJECT_TYPE) => config.projects.push(parse_project(section, props)?),
                other => debug!(
                    "Ignoring section [{}] with type {:?}",
                    section,
                    other.unwrap_or("<none>")
                ),
            },
        }
    }

    Ok(config)
}

fn parse_project(name: &str, props: &Properties) -> Result<ProjectConfig> {
    Ok(ProjectConfig {
        name: name.to_string(),
        url: mandatory(name, props, "url")?,
        r#ref: mandatory(name, props, "ref")?,
        spec: optional(props, "spec"),
        enabled: match props.get("enabled") {
            Some(value) => parse_bool(name, "enabled", value)?,
            None => true,
        },
    })
}

fn parse_mock(props: &Properties) -> Result<MockSettings> {
    let roots = parse_roots(&mandatory(MOCK_SECTION, props, "roots")?);
    if roots.is_empty() {
        return Err(Error::ConfigParse {
            message: "No mock roots listed in [mock]".to_string(),
            hint: Some("Set roots = <root>[, <root>...]".to_string()),
        });
    }
    Ok(MockSettings {
        url: mandatory(MOCK_SECTION, props, "url")?,
        r#ref: mandatory(MOCK_SECTION, props, "ref")?,
        roots,
    })
}

fn parse_backup(props: &Properties) -> Result<BackupSettings> {
    Ok(BackupSettings {
        remote_host: mandatory(BACKUP_SECTION, props, "remotehost")?,
        remote_dir: mandatory(BACKUP_SECTION, props, "remotedir")?,
    })
}

/// Split a comma separated root list, dropping blanks and duplicates.
pub fn parse_roots(csv: &str) -> Vec<String> {
    let mut roots: Vec<String> = Vec::new();
    for root in csv.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        if !roots.iter().any(|r| r == root) {
            roots.push(root.to_string());
        }
    }
    roots
}

fn mandatory(section: &str, props: &Properties, key: &str) -> Result<String> {
    optional(props, key).ok_or_else(|| Error::ConfigParse {
        message: format!("Could not find option '{}' in [{}] section", key, section),
        hint: Some(format!("Add '{} = ...' to the [{}] section", key, section)),
    })
}

fn optional(props: &Properties, key: &str) -> Option<String> {
    props
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        other => Err(Error::config(format!(
            "Option '{}' in [{}] is not a boolean: {}",
            key, section, other
        ))),
    }
}
