//! # Shared Build Run Options
//!
//! The `build` and `local` subcommands differ only in where their projects
//! come from. Everything else about a run (mock configuration, chroot
//! handling, change detection overrides and the remote backup) is described
//! by [`RunArgs`] and executed by [`run`].

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;

use rpmbuilder::backup::{RemoteFunction, Rsync};
use rpmbuilder::config::{BackupSettings, MockSettings};
use rpmbuilder::defaults;
use rpmbuilder::mock::{Mock, MockOptions};
use rpmbuilder::output::{emoji, render_report, OutputConfig};
use rpmbuilder::phases::orchestrator::{execute_build, MockSource, RunOptions, Toolchain};
use rpmbuilder::phases::planning::PlanOptions;
use rpmbuilder::project::Project;
use rpmbuilder::repository::Createrepo;
use rpmbuilder::workspace::WorkspaceManager;

/// What the remote backup host is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RemoteFunctionArg {
    /// Restore a new workspace from the backup
    Pull,
    /// Also push the workspace after a successful run
    Pullpush,
}

impl From<RemoteFunctionArg> for RemoteFunction {
    fn from(arg: RemoteFunctionArg) -> Self {
        match arg {
            RemoteFunctionArg::Pull => RemoteFunction::Pull,
            RemoteFunctionArg::Pullpush => RemoteFunction::PullPush,
        }
    }
}

/// Options shared by every command that runs builds
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Local mock configuration file.
    ///
    /// Overrides the `[mock]` section of the build configuration. Without
    /// either, `~/.config/rpmbuilder/mock/default.cfg` is used when present.
    /// Can also be set with the `RPMBUILDER_MOCKCONF` environment variable.
    #[arg(short, long, value_name = "FILE", env = "RPMBUILDER_MOCKCONF")]
    pub mockconf: Option<PathBuf>,

    /// Backup host holding a copy of the workspace.
    #[arg(long, value_name = "HOST", requires = "remote_dir")]
    pub remote_host: Option<String>,

    /// Directory on the backup host.
    #[arg(long, value_name = "DIR", requires = "remote_host")]
    pub remote_dir: Option<String>,

    /// Whether to only restore from the backup host or also push to it.
    #[arg(long, value_enum, value_name = "FUNCTION", default_value = "pull")]
    pub remote_function: RemoteFunctionArg,

    /// Build every project, even unchanged ones.
    #[arg(short, long)]
    pub force_rebuild: bool,

    /// Rebuild projects whose dependencies are rebuilt.
    #[arg(long)]
    pub rebuild_dependents: bool,

    /// Do not scrub and initialise the chroots before the first build.
    #[arg(long)]
    pub no_init: bool,

    /// Do not scrub the chroot after a failed build.
    #[arg(long)]
    pub no_scrub: bool,

    /// Extra arguments passed to every mock call, split on whitespace.
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    pub mock_arguments: Option<String>,

    /// Chroot suffix passed to mock as `--uniqueext`; defaults to `$USER`.
    #[arg(long, value_name = "EXT")]
    pub unique_ext: Option<String>,
}

impl RunArgs {
    /// Mock invocation options.
    pub fn mock_options(&self) -> MockOptions {
        let defaults = MockOptions::default();
        MockOptions {
            unique_ext: self.unique_ext.clone().unwrap_or(defaults.unique_ext),
            extra_args: self
                .mock_arguments
                .as_deref()
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            init: !self.no_init,
            scrub: !self.no_scrub,
        }
    }

    /// The backup host from the command line, else the configured one.
    pub fn backup_settings(&self, configured: Option<&BackupSettings>) -> Option<BackupSettings> {
        match (&self.remote_host, &self.remote_dir) {
            (Some(host), Some(dir)) => Some(BackupSettings {
                remote_host: host.clone(),
                remote_dir: dir.clone(),
            }),
            _ => configured.cloned(),
        }
    }

    /// Resolve the mock configuration source.
    ///
    /// `--mockconf` wins over the `[mock]` section, which wins over the
    /// default mock configuration file.
    pub fn mock_source(&self, settings: Option<&MockSettings>) -> Result<MockSource> {
        if let Some(path) = &self.mockconf {
            return Ok(MockSource::File(path.clone()));
        }
        if let Some(settings) = settings {
            return Ok(MockSource::Settings(settings.clone()));
        }
        let fallback = defaults::default_mock_config();
        if fallback.is_file() {
            return Ok(MockSource::File(fallback));
        }
        bail!(
            "No mock configuration: pass --mockconf, add a [mock] section to the \
             build configuration or create {}",
            fallback.display()
        )
    }

    /// Assemble the options of a run.
    pub fn run_options(
        &self,
        mock_settings: Option<&MockSettings>,
        backup: Option<&BackupSettings>,
    ) -> Result<RunOptions> {
        Ok(RunOptions {
            mock_source: self.mock_source(mock_settings)?,
            mock: self.mock_options(),
            plan: PlanOptions {
                force_rebuild: self.force_rebuild,
                rebuild_dependents: self.rebuild_dependents,
            },
            backup: self.backup_settings(backup),
            remote_function: self.remote_function.into(),
        })
    }
}

/// Run a build of `projects` in `workspace` with the real tools and print
/// the summary. Fails when any project failed or was blocked.
pub fn run(
    workspace: PathBuf,
    projects: &[Project],
    options: &RunOptions,
    color_flag: &str,
) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    println!(
        "{} Building {} project(s) in {}",
        emoji(&out, "🔨", "[BUILD]"),
        projects.iter().filter(|p| p.enabled).count(),
        workspace.display()
    );

    let manager = WorkspaceManager::new(workspace);
    let mock = Mock::new(options.mock.clone());
    let indexer = Createrepo::default();
    let rsync = Rsync::default();
    let tools = Toolchain {
        build: &mock,
        indexer: &indexer,
        backup: &rsync,
    };

    let report = execute_build(&manager, projects, options, &tools)
        .map_err(|e| anyhow::anyhow!("Build run failed: {}", e))?;

    println!();
    print!("{}", render_report(&out, &report));

    if !report.success() {
        let unbuilt = report.failed().len() + report.blocked().len();
        if unbuilt > 0 {
            bail!("{} project(s) were not built", unbuilt);
        }
        bail!("Build succeeded but the workspace backup failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    fn parse(args: &[&str]) -> RunArgs {
        let mut argv = vec!["test"];
        argv.extend_from_slice(args);
        TestCli::parse_from(argv).run
    }

    #[test]
    fn test_mock_options_from_flags() {
        let args = parse(&[
            "--no-init",
            "--unique-ext",
            "ci",
            "--mock-arguments",
            "--enable-network -v",
        ]);
        let options = args.mock_options();
        assert!(!options.init);
        assert!(options.scrub);
        assert_eq!(options.unique_ext, "ci");
        assert_eq!(options.extra_args, vec!["--enable-network", "-v"]);
    }

    #[test]
    fn test_command_line_backup_overrides_config() {
        let configured = BackupSettings {
            remote_host: "config-host".to_string(),
            remote_dir: "/config".to_string(),
        };
        let args = parse(&["--remote-host", "cli-host", "--remote-dir", "/cli"]);
        let backup = args.backup_settings(Some(&configured)).unwrap();
        assert_eq!(backup.remote_host, "cli-host");

        let args = parse(&[]);
        assert_eq!(args.backup_settings(Some(&configured)), Some(configured));
    }

    #[test]
    fn test_remote_host_requires_remote_dir() {
        let result = TestCli::try_parse_from(["test", "--remote-host", "h"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mockconf_wins_over_settings() {
        let settings = MockSettings {
            url: "https://git.example.com/mock.git".to_string(),
            r#ref: "master".to_string(),
            roots: vec!["epel-7-x86_64".to_string()],
        };
        let args = parse(&["--mockconf", "/etc/mock/epel-7-x86_64.cfg"]);
        assert_eq!(
            args.mock_source(Some(&settings)).unwrap(),
            MockSource::File(PathBuf::from("/etc/mock/epel-7-x86_64.cfg"))
        );

        let args = parse(&[]);
        assert_eq!(
            args.mock_source(Some(&settings)).unwrap(),
            MockSource::Settings(settings)
        );
    }

    #[test]
    fn test_run_options_plan_flags() {
        let args = parse(&[
            "-f",
            "--rebuild-dependents",
            "--remote-function",
            "pullpush",
            "--mockconf",
            "/tmp/epel-7-x86_64.cfg",
        ]);
        let options = args.run_options(None, None).unwrap();
        assert!(options.plan.force_rebuild);
        assert!(options.plan.rebuild_dependents);
        assert!(options.remote_function.pushes());
    }
}
