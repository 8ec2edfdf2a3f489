//! Thin wrappers around the `git` command line client.
//!
//! Every function runs the system `git`, so SSH keys, credential helpers and
//! anything else configured in `~/.gitconfig` apply unchanged.

use std::fs;
use std::path::Path;
use std::process::Command;

use log::debug;
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Hex digits of the digest kept in fingerprints.
const DIRTY_DIGEST_LEN: usize = 12;

/// Run `git <args>` inside `dir` and return its trimmed stdout.
pub fn run(dir: &Path, args: &[&str]) -> Result<String, Error> {
    let command = format!("git {}", args.join(" "));
    debug!("Running '{}' under {}", command, dir.display());

    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::GitCommand {
            command: command.clone(),
            directory: dir.to_path_buf(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::GitCommand {
            command,
            directory: dir.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Clone `url` into `target_dir` (full history, tags included)
pub fn clone(url: &str, ref_name: &str, target_dir: &Path) -> Result<(), Error> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    debug!("Cloning {} into {}", url, target_dir.display());
    let output = Command::new("git")
        .arg("clone")
        .arg(url)
        .arg(target_dir)
        .output()
        .map_err(|e| Error::GitClone {
            url: url.to_string(),
            r#ref: ref_name.to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);

        // Provide helpful error message for common auth failures
        let message = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("Could not read from remote repository")
        {
            format!(
                "Authentication failed. Make sure the build host has access to the repository.\n\
                Error: {}",
                stderr.trim()
            )
        } else {
            stderr.trim().to_string()
        };

        return Err(Error::GitClone {
            url: url.to_string(),
            r#ref: ref_name.to_string(),
            message,
        });
    }

    Ok(())
}

/// Discard local modifications of a checkout.
pub fn reset_hard(dir: &Path) -> Result<(), Error> {
    run(dir, &["reset", "--hard"]).map(drop)
}

/// Currently configured `origin` URL.
pub fn remote_url(dir: &Path) -> Result<String, Error> {
    run(dir, &["config", "--get", "remote.origin.url"])
}

pub fn set_remote_url(dir: &Path, url: &str) -> Result<(), Error> {
    run(dir, &["remote", "set-url", "origin", url]).map(drop)
}

/// Fetch branches, then tags, from `origin`.
pub fn fetch(dir: &Path) -> Result<(), Error> {
    run(dir, &["fetch", "origin"])?;
    run(dir, &["fetch", "origin", "--tags"]).map(drop)
}

/// Detach HEAD at `origin/<ref>`, falling back to `<ref>` as a tag or commit.
pub fn checkout(dir: &Path, ref_name: &str) -> Result<(), Error> {
    let remote_ref = format!("origin/{}", ref_name);
    match run(dir, &["checkout", "--force", "--detach", &remote_ref]) {
        Ok(_) => Ok(()),
        Err(e) => {
            debug!("Unable to checkout {} as branch: {}", remote_ref, e);
            run(dir, &["checkout", "--force", "--detach", ref_name]).map(drop)
        }
    }
}

/// Full commit id of HEAD.
pub fn head_commit(dir: &Path) -> Result<String, Error> {
    run(dir, &["rev-parse", "HEAD"])
}

/// Abbreviated commit id of HEAD.
pub fn short_hash(dir: &Path) -> Result<String, Error> {
    run(dir, &["rev-parse", "--short", "HEAD"])
}

/// Number of commits reachable from HEAD.
pub fn commit_count(dir: &Path) -> Result<u64, Error> {
    let count = run(dir, &["rev-list", "HEAD", "--count"])?;
    count.parse().map_err(|_| Error::GitCommand {
        command: "git rev-list HEAD --count".to_string(),
        directory: dir.to_path_buf(),
        stderr: format!("unexpected commit count '{}'", count),
    })
}

/// Branch name of HEAD, `HEAD` when detached.
pub fn current_branch(dir: &Path) -> Result<String, Error> {
    run(dir, &["rev-parse", "--abbrev-ref", "HEAD"])
}

/// `git describe --tags --long`; fails when no tag is reachable.
pub fn describe(dir: &Path) -> Result<String, Error> {
    run(dir, &["describe", "--tags", "--long"])
}

/// Digest of the local modifications of a checkout, `None` when clean.
///
/// A checkout is dirty when `git status` lists anything, untracked files
/// included. The digest covers the diff against HEAD plus the names and
/// contents of untracked files, so it changes with every further edit.
pub fn dirty_digest(dir: &Path) -> Result<Option<String>, Error> {
    if run(dir, &["status", "--porcelain"])?.is_empty() {
        return Ok(None);
    }

    let mut hasher = Sha256::new();
    hasher.update(run(dir, &["diff", "HEAD", "--binary"])?.as_bytes());
    let untracked = run(dir, &["ls-files", "--others", "--exclude-standard", "-z"])?;
    for file in untracked.split('\0').filter(|f| !f.is_empty()) {
        hasher.update(b"\0");
        hasher.update(file.as_bytes());
        hasher.update(b"\0");
        hasher.update(fs::read(dir.join(file))?);
    }
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(DIRTY_DIGEST_LEN);
    Ok(Some(digest))
}

/// True when `dir` is inside a git work tree.
pub fn is_repository(dir: &Path) -> bool {
    dir.is_dir()
        && run(dir, &["rev-parse", "--is-inside-work-tree"])
            .map(|out| out == "true")
            .unwrap_or(false)
}
