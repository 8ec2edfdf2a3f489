//! # Version Resolution
//!
//! This module derives the package version of a project from the git history
//! of its checkout. The rules are:
//!
//! - **Exact tag**: a clean checkout sitting on tag `1.0` builds as `1.0`.
//! - **Commits after a tag**: two commits after `1.0` with abbreviated hash
//!   `ad96bc2` builds as `1.0.c2.gad96bc2`.
//! - **No tags**: the branch name (or the configured ref when the checkout is
//!   detached) replaces the tag and the commit count is the full history
//!   length, e.g. `master.c110.gce32b26`.
//! - **Dirty checkouts**: `.dirty` follows the tag or branch, e.g.
//!   `1.0.dirty.c2.gad96bc2`, or `1.0.dirty` on an exact tag. Dirty means
//!   `git status` lists anything, untracked files included, whether or not
//!   the checkout is tagged.
//! - **Not versioned**: a directory without git metadata builds as
//!   [`PLACEHOLDER_VERSION`].
//!
//! RPM forbids `-` in versions, so every character outside the allowed set
//! is turned into a `.` by [`sanitize`].

use std::path::Path;

use log::{debug, warn};

use crate::error::Result;
use crate::workspace::GitOperations;

/// Version used for sources that are not under version control.
pub const PLACEHOLDER_VERSION: &str = "a.b";

/// The facts a version string is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDescriptor {
    /// Tag, branch, or configured ref.
    pub base: String,
    /// True when `base` is a tag.
    pub tagged: bool,
    /// Commits since the tag, or the full history length when untagged.
    pub distance: u64,
    /// Abbreviated commit id.
    pub hash: String,
    pub dirty: bool,
}

impl VersionDescriptor {
    /// Render the RPM version string.
    pub fn render(&self) -> String {
        let mut segments: Vec<String> = Vec::new();
        let base = sanitize(&self.base);
        if !base.is_empty() {
            segments.push(base);
        }
        if self.dirty {
            segments.push("dirty".to_string());
        }
        if !(self.tagged && self.distance == 0) {
            segments.push(format!("c{}", self.distance));
            segments.push(format!("g{}", self.hash));
        }
        segments.join(".")
    }
}

/// Parse `git describe --tags --long` output, with or without `--dirty`.
///
/// The output is read from the right, so tags may contain dashes:
/// `release-1.0-2-gad96bc2-dirty` has tag `release-1.0`.
pub fn parse_describe(output: &str) -> Option<VersionDescriptor> {
    let output = output.trim();
    let (rest, dirty) = match output.strip_suffix("-dirty") {
        Some(rest) => (rest, true),
        None => (output, false),
    };
    let (rest, hash) = rest.rsplit_once('-')?;
    let hash = hash.strip_prefix('g')?;
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let (tag, distance) = rest.rsplit_once('-')?;
    if tag.is_empty() || distance.is_empty() || !distance.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(VersionDescriptor {
        base: tag.to_string(),
        tagged: true,
        distance: distance.parse().ok()?,
        hash: hash.to_string(),
        dirty,
    })
}

/// Replace every character RPM does not accept in a version with `.`.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '~' | '^') {
                c
            } else {
                '.'
            }
        })
        .collect()
}

/// Read the version descriptor of a checkout.
///
/// Returns `None` when `dir` is not a git repository.
pub fn describe(
    git: &dyn GitOperations,
    dir: &Path,
    configured_ref: Option<&str>,
) -> Result<Option<VersionDescriptor>> {
    if !git.is_repository(dir) {
        return Ok(None);
    }
    let dirty = git.dirty_state(dir)?.is_some();

    if let Ok(output) = git.describe(dir) {
        if let Some(descriptor) = parse_describe(&output) {
            return Ok(Some(VersionDescriptor {
                dirty,
                ..descriptor
            }));
        }
        debug!("Unexpected describe output '{}', ignoring tags", output);
    }

    let branch = git.current_branch(dir)?;
    let base = match (branch.as_str(), configured_ref) {
        ("HEAD", Some(r)) => r.to_string(),
        ("HEAD", None) => String::new(),
        (b, _) => b.to_string(),
    };

    Ok(Some(VersionDescriptor {
        base,
        tagged: false,
        distance: git.commit_count(dir)?,
        hash: git.short_hash(dir)?,
        dirty,
    }))
}

/// Resolve the version string of a checkout; never fails.
pub fn resolve(git: &dyn GitOperations, dir: &Path, configured_ref: Option<&str>) -> String {
    match describe(git, dir, configured_ref) {
        Ok(Some(descriptor)) => {
            let version = descriptor.render();
            if version.is_empty() {
                PLACEHOLDER_VERSION.to_string()
            } else {
                version
            }
        }
        Ok(None) => {
            debug!("{} is not a git checkout", dir.display());
            PLACEHOLDER_VERSION.to_string()
        }
        Err(e) => {
            warn!(
                "Could not read version of {}, using {}: {}",
                dir.display(),
                PLACEHOLDER_VERSION,
                e
            );
            PLACEHOLDER_VERSION.to_string()
        }
    }
}
