//! # Error Handling
//!
//! This module defines the centralized error type of the `rpmbuilder`
//! library. It uses `thiserror` to build a single `Error` enum covering every
//! failure the build pipeline can hit, from configuration parsing to the
//! external tools it drives.
//!
//! ## Error classes
//!
//! The variants fall into a few classes which the pipeline treats differently:
//!
//! - **Fatal before any build**: [`Error::ConfigParse`] and
//!   [`Error::CyclicDependency`]. The run aborts before anything is built.
//! - **Per-project failures**: [`Error::GitClone`], [`Error::GitCommand`],
//!   [`Error::Spec`], [`Error::Release`], [`Error::BuildTool`] and
//!   [`Error::ToolValidation`]. The
//!   project and everything depending on it are skipped, independent projects
//!   keep building.
//! - **Warnings**: [`Error::RepositoryUpdate`]. Packages were produced but
//!   the repository metadata could not be regenerated.
//!
//! The `Result` type alias is used throughout the library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for rpmbuilder operations
#[derive(Error, Debug)]
pub enum Error {
    /// The build configuration file is malformed or misses mandatory fields.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// The projects' spec declarations form a dependency cycle.
    #[error("Cyclic dependency between projects: {}", cycle.join(" -> "))]
    CyclicDependency {
        /// Project names along the cycle, first name repeated at the end
        cycle: Vec<String>,
    },

    /// Cloning a project repository failed.
    #[error("Git clone error for {url}@{r#ref}: {message}")]
    GitClone {
        url: String,
        r#ref: String,
        message: String,
    },

    /// A git command failed inside a checkout.
    #[error("Git command failed in {}: {command} - {stderr}", directory.display())]
    GitCommand {
        command: String,
        directory: PathBuf,
        stderr: String,
    },

    /// A spec file could not be located or parsed.
    #[error("Spec file error in {}: {message}", path.display())]
    Spec { path: PathBuf, message: String },

    /// No release number is left for the next build of a package.
    #[error("Cannot number the next release of {package}-{version}: {message}")]
    Release {
        package: String,
        version: String,
        message: String,
    },

    /// The chroot build tool failed or produced no packages.
    #[error("Build of {project} in {root} failed: {message}")]
    BuildTool {
        project: String,
        root: String,
        message: String,
    },

    /// A required external tool is missing or unusable.
    #[error("Tool validation error: {tool} - {message}")]
    ToolValidation { tool: String, message: String },

    /// Repository metadata regeneration failed after a successful build.
    #[error("Repository metadata update failed for {}: {message}", directory.display())]
    RepositoryUpdate { directory: PathBuf, message: String },

    /// Restoring from or pushing to the remote backup host failed.
    #[error("Remote backup error for {host}: {message}")]
    Backup { host: String, message: String },

    /// The persisted build state could not be read or written.
    #[error("Build state error in {}: {message}", path.display())]
    State { path: PathBuf, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A directory walking error, wrapped from `walkdir::Error`.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl Error {
    /// Returns true for errors that abort the whole run before any build.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigParse { .. } | Error::CyclicDependency { .. } | Error::State { .. }
        )
    }

    /// Shorthand for a configuration error without a hint.
    pub fn config(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            hint: None,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
