//! # Mock Chroot Builds
//!
//! This module describes the mock environment a workspace builds in and
//! drives the `mock` and `spectool` tools.
//!
//! ## Environment
//!
//! A [`MockEnvironment`] is a mock configuration directory plus the roots to
//! build for. It comes either from the `etc/mock` directory of the mock
//! settings checkout (roots listed in the build configuration) or from a
//! single local `.cfg` file (the file stem is the root).
//!
//! ## Tools
//!
//! All tool invocations go through the [`BuildTools`] trait. [`Mock`] is the
//! real implementation; its argument lists are built by pure functions so
//! they can be checked without running anything.

use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use log::{debug, info, warn};
use regex::Regex;

use crate::defaults::MOCK_LOG_FILE;
use crate::error::{Error, Result};

/// One mock root and what its configuration says about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRoot {
    pub name: String,
    pub target_arch: Option<String>,
    pub dist: Option<String>,
}

impl MockRoot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_arch: None,
            dist: None,
        }
    }
}

/// Mock configuration directory and the roots built with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockEnvironment {
    pub config_dir: PathBuf,
    pub roots: Vec<MockRoot>,
}

impl MockEnvironment {
    /// Environment of a single local mock configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ConfigParse {
                message: format!("Mock configuration {} not found", path.display()),
                hint: Some("Pass an existing .cfg file with --mockconf".to_string()),
            });
        }
        let path = path.canonicalize()?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let config_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let root = read_root(&config_dir, &name)?;
        Ok(Self {
            config_dir,
            roots: vec![root],
        })
    }

    /// Environment of a mock settings checkout with its `etc/mock` directory.
    pub fn from_checkout(checkout: &Path, roots: &[String]) -> Result<Self> {
        let config_dir = checkout.join("etc").join("mock");
        let roots = roots
            .iter()
            .map(|name| read_root(&config_dir, name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { config_dir, roots })
    }

    pub fn root_names(&self) -> Vec<&str> {
        self.roots.iter().map(|r| r.name.as_str()).collect()
    }

    /// Root whose repository decides release numbers.
    pub fn first_root(&self) -> Option<&str> {
        self.roots.first().map(|r| r.name.as_str())
    }
}

fn read_root(config_dir: &Path, name: &str) -> Result<MockRoot> {
    let cfg = config_dir.join(format!("{}.cfg", name));
    let mut root = MockRoot::new(name);
    match fs::read_to_string(&cfg) {
        Ok(content) => {
            let (target_arch, dist) = read_root_settings(&content)?;
            root.target_arch = target_arch;
            root.dist = dist;
        }
        Err(e) => warn!("Cannot read mock configuration {}: {}", cfg.display(), e),
    }
    Ok(root)
}

/// Read `config_opts['target_arch']` and `config_opts['dist']` from a mock
/// configuration.
pub fn read_root_settings(content: &str) -> Result<(Option<String>, Option<String>)> {
    let option = Regex::new(r#"^\s*config_opts\[['"](\w+)['"]\]\s*=\s*['"]([^'"]*)['"]"#)?;
    let mut target_arch = None;
    let mut dist = None;
    for line in content.lines() {
        if let Some(caps) = option.captures(line) {
            match &caps[1] {
                "target_arch" => target_arch = Some(caps[2].to_string()),
                "dist" => dist = Some(caps[2].to_string()),
                _ => {}
            }
        }
    }
    Ok((target_arch, dist))
}

/// How mock is run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockOptions {
    /// Passed as `--uniqueext` so parallel builders do not share chroots.
    pub unique_ext: String,
    /// Extra arguments appended to every mock call.
    pub extra_args: Vec<String>,
    /// Scrub and initialise each root before its first build.
    pub init: bool,
    /// Scrub the chroot after a failed build.
    pub scrub: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            unique_ext: env::var("USER").unwrap_or_else(|_| "rpmbuilder".to_string()),
            extra_args: Vec::new(),
            init: true,
            scrub: true,
        }
    }
}

/// Arguments common to every mock call.
pub fn base_args(config_dir: &Path, root: &str, options: &MockOptions) -> Vec<String> {
    vec![
        format!("--configdir={}", config_dir.display()),
        format!("--root={}", root),
        format!("--uniqueext={}", options.unique_ext),
        "--verbose".to_string(),
        "--old-chroot".to_string(),
        "--enable-network".to_string(),
    ]
}

/// `mock --buildsrpm` arguments.
pub fn buildsrpm_args(
    spec: &Path,
    sources: &Path,
    result_dir: &Path,
    local_repo: Option<&Path>,
) -> Vec<String> {
    let mut args = vec![
        "--buildsrpm".to_string(),
        format!("--spec={}", spec.display()),
        format!("--sources={}", sources.display()),
        format!("--resultdir={}", result_dir.display()),
    ];
    args.extend(addrepo_arg(local_repo));
    args
}

/// `mock --rebuild` arguments.
pub fn rebuild_args(srpm: &Path, result_dir: &Path, local_repo: Option<&Path>) -> Vec<String> {
    let mut args = vec![
        "--rebuild".to_string(),
        srpm.display().to_string(),
        format!("--resultdir={}", result_dir.display()),
    ];
    args.extend(addrepo_arg(local_repo));
    args
}

fn addrepo_arg(local_repo: Option<&Path>) -> Option<String> {
    local_repo.map(|repo| format!("--addrepo=file://{}", repo.display()))
}

/// `spectool` arguments downloading remote sources of a spec.
pub fn spectool_args(spec: &Path, dest: &Path) -> Vec<String> {
    vec![
        "-g".to_string(),
        "--directory".to_string(),
        dest.display().to_string(),
        spec.display().to_string(),
    ]
}

/// True when `groups` (output of `id -nG`) contains `group`.
pub fn in_group(groups: &str, group: &str) -> bool {
    groups.split_whitespace().any(|g| g == group)
}

/// Warn when the current user cannot run mock without privileges.
pub fn check_mock_group() {
    match Command::new("id").arg("-nG").output() {
        Ok(out) if out.status.success() => {
            let groups = String::from_utf8_lossy(&out.stdout);
            if !in_group(&groups, "mock") {
                warn!("Current user is not in the 'mock' group; mock may ask for privileges");
            }
        }
        _ => debug!("Could not read group membership"),
    }
}

/// Look up an executable in `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths)
            .map(|dir| dir.join(name))
            .find(|p| p.is_file())
    })
}

/// Trait for the external build tools - allows mocking in tests
pub trait BuildTools: Send + Sync {
    /// Fail early when a required tool is missing.
    fn validate(&self) -> Result<()>;

    /// Scrub and initialise a chroot before its first build.
    fn init_chroot(&self, env: &MockEnvironment, root: &str, result_dir: &Path) -> Result<()>;

    /// Build a source package from a spec and its sources.
    #[allow(clippy::too_many_arguments)]
    fn build_srpm(
        &self,
        env: &MockEnvironment,
        project: &str,
        root: &str,
        spec: &Path,
        sources: &Path,
        result_dir: &Path,
        local_repo: Option<&Path>,
    ) -> Result<()>;

    /// Build binary packages from a source package.
    fn rebuild(
        &self,
        env: &MockEnvironment,
        project: &str,
        root: &str,
        srpm: &Path,
        result_dir: &Path,
        local_repo: Option<&Path>,
    ) -> Result<()>;

    /// Remove a chroot after a failure.
    fn scrub_chroot(&self, env: &MockEnvironment, root: &str) -> Result<()>;

    /// Download the remote sources of a spec into `dest`.
    fn download_sources(&self, project: &str, spec: &Path, dest: &Path) -> Result<()>;
}

/// The real `mock` / `spectool` implementation of `BuildTools`
pub struct Mock {
    executable: PathBuf,
    spectool: PathBuf,
    options: MockOptions,
}

impl Mock {
    pub fn new(options: MockOptions) -> Self {
        Self {
            executable: PathBuf::from("mock"),
            spectool: PathBuf::from("spectool"),
            options,
        }
    }

    pub fn with_executables(
        mut self,
        mock: impl Into<PathBuf>,
        spectool: impl Into<PathBuf>,
    ) -> Self {
        self.executable = mock.into();
        self.spectool = spectool.into();
        self
    }

    pub fn options(&self) -> &MockOptions {
        &self.options
    }

    /// Run mock with `args`, appending its output to `log_file`.
    fn run(
        &self,
        env: &MockEnvironment,
        project: &str,
        root: &str,
        args: Vec<String>,
        log_file: &Path,
    ) -> Result<()> {
        let fail = |message: String| Error::BuildTool {
            project: project.to_string(),
            root: root.to_string(),
            message,
        };

        let mut command_args = base_args(&env.config_dir, root, &self.options);
        command_args.extend(args);
        command_args.extend(self.options.extra_args.iter().cloned());

        if let Some(parent) = log_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;
        let log_err = log.try_clone()?;

        info!("Running mock, log goes to {}", log_file.display());
        debug!(
            "[mock-start] {} {}",
            self.executable.display(),
            command_args.join(" ")
        );
        let start = Instant::now();
        let status = Command::new(&self.executable)
            .args(&command_args)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .status()
            .map_err(|e| Error::ToolValidation {
                tool: self.executable.display().to_string(),
                message: e.to_string(),
            })?;
        debug!("[mock-end] took {:.1}s", start.elapsed().as_secs_f64());

        if !status.success() {
            let guidance = format!(
                "{} --configdir={} --root={} --uniqueext={} --shell",
                self.executable.display(),
                env.config_dir.display(),
                root,
                self.options.unique_ext
            );
            return Err(fail(format!(
                "mock exited with {}. Log for debugging: {}. To open a mock shell, run: {}",
                status,
                log_file.display(),
                guidance
            )));
        }
        Ok(())
    }
}

impl BuildTools for Mock {
    fn validate(&self) -> Result<()> {
        let name = self.executable.to_string_lossy();
        if find_executable(&name).is_none() {
            return Err(Error::ToolValidation {
                tool: name.to_string(),
                message: "executable not found, is it installed?".to_string(),
            });
        }
        check_mock_group();
        Ok(())
    }

    fn init_chroot(&self, env: &MockEnvironment, root: &str, result_dir: &Path) -> Result<()> {
        info!("Initialising mock chroot {}", root);
        let log = result_dir.join(format!("mock-init-{}.log", root));
        self.run(env, "chroot init", root, vec!["--scrub=all".to_string()], &log)?;
        self.run(env, "chroot init", root, vec!["--init".to_string()], &log)
    }

    fn build_srpm(
        &self,
        env: &MockEnvironment,
        project: &str,
        root: &str,
        spec: &Path,
        sources: &Path,
        result_dir: &Path,
        local_repo: Option<&Path>,
    ) -> Result<()> {
        self.run(
            env,
            project,
            root,
            buildsrpm_args(spec, sources, result_dir, local_repo),
            &result_dir.join(MOCK_LOG_FILE),
        )
    }

    fn rebuild(
        &self,
        env: &MockEnvironment,
        project: &str,
        root: &str,
        srpm: &Path,
        result_dir: &Path,
        local_repo: Option<&Path>,
    ) -> Result<()> {
        self.run(
            env,
            project,
            root,
            rebuild_args(srpm, result_dir, local_repo),
            &result_dir.join(MOCK_LOG_FILE),
        )
    }

    fn scrub_chroot(&self, env: &MockEnvironment, root: &str) -> Result<()> {
        info!("Removing mock chroot {}", root);
        let mut args = base_args(&env.config_dir, root, &self.options);
        args.push("--orphanskill".to_string());
        args.push("--scrub=chroot".to_string());
        let status = Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::null())
            .status()?;
        if !status.success() {
            return Err(Error::BuildTool {
                project: "chroot scrub".to_string(),
                root: root.to_string(),
                message: format!("mock chroot removal failed with {}", status),
            });
        }
        Ok(())
    }

    fn download_sources(&self, project: &str, spec: &Path, dest: &Path) -> Result<()> {
        fs::create_dir_all(dest)?;
        let args = spectool_args(spec, dest);
        debug!("Running {} {}", self.spectool.display(), args.join(" "));
        let output = Command::new(&self.spectool)
            .args(&args)
            .output()
            .map_err(|e| Error::ToolValidation {
                tool: self.spectool.display().to_string(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(Error::BuildTool {
                project: project.to_string(),
                root: "-".to_string(),
                message: format!(
                    "spectool failed to download sources: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}
