//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which checks an INI
//! build configuration without touching any workspace.
//!
//! ## Functionality
//!
//! - **Configuration Validation**: Parses the configuration file and checks
//!   mandatory fields, booleans and section names.
//! - **Summary**: Lists enabled and disabled projects, the mock settings
//!   repository and the remote backup host.
//! - **Warnings**: Reports configurations that parse but cannot build on
//!   their own, such as a missing `[mock]` section.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use rpmbuilder::config::{self, BuildConfig};
use rpmbuilder::output::{emoji, OutputConfig};

/// Validate a build configuration file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the INI build configuration file to validate.
    ///
    /// Can also be set with the `RPMBUILDER_CONFIG` environment variable.
    #[arg(short, long, value_name = "FILE", env = "RPMBUILDER_CONFIG")]
    pub config: PathBuf,

    /// Use strict validation (fail on warnings).
    #[arg(long)]
    pub strict: bool,
}

/// Execute the `validate` command.
///
/// # Arguments
/// * `args` - The command arguments
/// * `color_flag` - The value of the global --color flag ("always", "never", or "auto")
pub fn execute(args: ValidateArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let config_path = &args.config;
    println!(
        "{} Validating configuration: {}",
        emoji(&out, "🔍", "[SCAN]"),
        config_path.display()
    );

    let build_config = match config::from_file(config_path) {
        Ok(build_config) => {
            println!(
                "{} Configuration file parsed successfully",
                emoji(&out, "✅", "[OK]")
            );
            build_config
        }
        Err(e) => {
            println!(
                "{} Configuration parsing failed: {}",
                emoji(&out, "❌", "[ERR]"),
                e
            );
            return Err(anyhow::anyhow!("Configuration parsing failed: {}", e));
        }
    };

    println!("\n{} Configuration Summary:", emoji(&out, "📊", "[INFO]"));
    let enabled: Vec<&str> = build_config
        .enabled_projects()
        .map(|p| p.name.as_str())
        .collect();
    println!("   Projects: {}", build_config.projects.len());
    println!("   Enabled: {}", enabled.join(", "));
    let disabled: Vec<&str> = build_config
        .projects
        .iter()
        .filter(|p| !p.enabled)
        .map(|p| p.name.as_str())
        .collect();
    if !disabled.is_empty() {
        println!("   Disabled: {}", disabled.join(", "));
    }
    if let Some(mock) = &build_config.mock {
        println!(
            "   Mock settings: {} @ {} ({})",
            mock.url,
            mock.r#ref,
            mock.roots.join(", ")
        );
    }
    if let Some(backup) = &build_config.backup {
        println!("   Backup: {}:{}", backup.remote_host, backup.remote_dir);
    }

    let warnings = warnings(&build_config);
    for warning in &warnings {
        println!("{} {}", emoji(&out, "⚠️", "[WARN]"), warning);
    }

    if args.strict && !warnings.is_empty() {
        return Err(anyhow::anyhow!(
            "Validation failed with {} warning(s)",
            warnings.len()
        ));
    }

    println!("\n{} Configuration is valid", emoji(&out, "✅", "[OK]"));
    Ok(())
}

/// Problems that do not stop the configuration from parsing
fn warnings(build_config: &BuildConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if build_config.enabled_projects().next().is_none() {
        warnings.push("No enabled projects, nothing will be built".to_string());
    }
    if build_config.mock.is_none() {
        warnings.push(
            "No [mock] section, builds need --mockconf or a default mock configuration"
                .to_string(),
        );
    }
    warnings
}
