//! # Output Configuration
//!
//! This module provides utilities for controlling CLI output appearance,
//! including color and emoji support based on terminal capabilities and
//! user preferences.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rpmbuilder::output::{OutputConfig, emoji};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//!
//! // Use emoji helper that respects config
//! println!("{} Building...", emoji(&config, "🔨", "[BUILD]"));
//! ```
//!
//! [`render_report`] turns a [`RunReport`] into the summary printed at the
//! end of a build run.

use std::env;
use std::fmt::Write;

use crate::phases::{ProjectStatus, RunReport};

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// # Behavior
    /// - `--color=always`: Force colors on (overrides NO_COLOR)
    /// - `--color=never`: Force colors off
    /// - `--color=auto`: Detect based on environment
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // Check NO_COLOR first (https://no-color.org/)
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        // Check CLICOLOR=0 disables colors
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        // Check CLICOLOR_FORCE=1 forces colors
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        // Check TERM=dumb
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        // Use console crate's detection for TTY and color support
        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the appropriate string based on color configuration.
///
/// When colors are enabled, returns the emoji. When disabled, returns
/// the plain text alternative.
///
/// # Arguments
/// * `config` - The output configuration
/// * `emoji` - The emoji to use when colors are enabled
/// * `plain` - The plain text to use when colors are disabled
///
/// # Example
/// ```rust,ignore
/// let config = OutputConfig::from_env_and_flag("auto");
/// println!("{} Validating...", emoji(&config, "🔍", "[SCAN]"));
/// ```
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// Render the end-of-run summary: one line per project in build order,
/// then warnings and totals.
pub fn render_report(config: &OutputConfig, report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} Build summary", emoji(config, "📦", "[SUMMARY]"));
    for outcome in &report.outcomes {
        let line = match &outcome.status {
            ProjectStatus::Built(packages) => format!(
                "{} {} {}-{}",
                emoji(config, "✅", "[BUILT]"),
                outcome.name,
                packages.version,
                packages.release
            ),
            ProjectStatus::Skipped => {
                format!("{} {} unchanged", emoji(config, "⏭️", "[SKIP]"), outcome.name)
            }
            ProjectStatus::Failed(message) => format!(
                "{} {}: {}",
                emoji(config, "❌", "[FAILED]"),
                outcome.name,
                message
            ),
            ProjectStatus::Blocked(message) => format!(
                "{} {}: {}",
                emoji(config, "🚫", "[BLOCKED]"),
                outcome.name,
                message
            ),
        };
        let _ = writeln!(out, "   {}", line);
        if let (ProjectStatus::Built(packages), Some(reason)) = (&outcome.status, &outcome.reason)
        {
            let _ = writeln!(out, "      reason: {}", reason);
            for file in packages.rpms.iter().chain(packages.srpms.iter()) {
                let _ = writeln!(out, "      {}", file);
            }
        }
    }
    for removed in &report.removed {
        let _ = writeln!(out, "   removed obsolete project {}", removed);
    }
    for warning in &report.warnings {
        let _ = writeln!(out, "{} {}", emoji(config, "⚠️", "[WARN]"), warning);
    }
    if let Some(error) = &report.backup_error {
        let _ = writeln!(out, "{} {}", emoji(config, "❌", "[ERR]"), error);
    }
    let _ = writeln!(
        out,
        "{} built, {} unchanged, {} failed, {} blocked",
        report.built().len(),
        report.skipped().len(),
        report.failed().len(),
        report.blocked().len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::BuildReason;
    use crate::phases::{BuiltPackages, ProjectOutcome};

    #[test]
    fn test_color_always() {
        let config = OutputConfig::from_env_and_flag("always");
        assert!(config.use_color);
    }

    #[test]
    fn test_color_never() {
        let config = OutputConfig::from_env_and_flag("never");
        assert!(!config.use_color);
    }

    #[test]
    fn test_emoji_helper_with_color() {
        let config = OutputConfig::with_color();
        assert_eq!(emoji(&config, "🔍", "[SCAN]"), "🔍");
    }

    #[test]
    fn test_emoji_helper_without_color() {
        let config = OutputConfig::without_color();
        assert_eq!(emoji(&config, "🔍", "[SCAN]"), "[SCAN]");
    }

    #[test]
    fn test_render_report_plain() {
        let report = RunReport {
            outcomes: vec![
                ProjectOutcome {
                    name: "helloworld".to_string(),
                    status: ProjectStatus::Built(BuiltPackages {
                        version: "1.0.c2.gad96bc2".to_string(),
                        release: "1%{?dist}".to_string(),
                        rpms: vec!["helloworld-1.0.c2.gad96bc2-1.el7.x86_64.rpm".to_string()],
                        srpms: vec![],
                    }),
                    reason: Some(BuildReason::NoPreviousBuild),
                    commit: None,
                },
                ProjectOutcome {
                    name: "app".to_string(),
                    status: ProjectStatus::Blocked(
                        "blocked by dependency failure: lib".to_string(),
                    ),
                    reason: None,
                    commit: None,
                },
            ],
            warnings: vec!["Repository metadata update failed".to_string()],
            ..Default::default()
        };
        let text = render_report(&OutputConfig::without_color(), &report);
        assert!(text.contains("[BUILT] helloworld 1.0.c2.gad96bc2-1%{?dist}"));
        assert!(text.contains("reason: no previous build"));
        assert!(text.contains("helloworld-1.0.c2.gad96bc2-1.el7.x86_64.rpm"));
        assert!(text.contains("[BLOCKED] app: blocked by dependency failure: lib"));
        assert!(text.contains("[WARN] Repository metadata update failed"));
        assert!(text.ends_with("1 built, 0 unchanged, 0 failed, 1 blocked\n"));
    }
}
