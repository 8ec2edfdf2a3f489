//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// rpmbuilder - Build RPM packages from many projects with mock
#[derive(Parser, Debug)]
#[command(name = "rpmbuilder")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the projects of a build configuration
    Build(commands::build::BuildArgs),

    /// Build projects from local directories
    Local(commands::local::LocalArgs),

    /// Push a workspace to the remote backup host
    Stash(commands::stash::StashArgs),

    /// Show the build order and dependencies of configured projects
    Deps(commands::deps::DepsArgs),

    /// Validate a build configuration file
    Validate(commands::validate::ValidateArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        self.init_logging();

        match self.command {
            Commands::Build(args) => commands::build::execute(args, &self.color),
            Commands::Local(args) => commands::local::execute(args, &self.color),
            Commands::Stash(args) => commands::stash::execute(args),
            Commands::Deps(args) => commands::deps::execute(args),
            Commands::Validate(args) => commands::validate::execute(args, &self.color),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }

    /// `RUST_LOG` wins over the command line.
    fn init_logging(&self) {
        let level = if self.verbose {
            "debug"
        } else {
            self.log_level.as_str()
        };
        let env = env_logger::Env::default().default_filter_or(level);
        let _ = env_logger::Builder::from_env(env)
            .format_target(false)
            .try_init();
    }
}
