//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures, helper functions, and INI
//! configuration snippets to reduce duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_config(configs::HELLOWORLD);
//!     fixture.command().arg("validate").arg("--config").arg(fixture.config_path());
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    pub use super::TestFixture;
}

/// Common build configuration snippets for testing.
#[allow(dead_code)]
pub mod configs {
    /// One project and a mock settings repository.
    pub const HELLOWORLD: &str = "\
[mock]
url = https://git.example.com/mock-settings.git
ref = master
roots = epel-7-x86_64

[helloworld]
type = project
url = https://git.example.com/helloworld.git
ref = master
";

    /// A project without any mock section.
    pub const WITHOUT_MOCK: &str = "\
[helloworld]
type = project
url = https://git.example.com/helloworld.git
ref = master
";

    /// Two projects where `app` requires `lib`, plus a backup host.
    pub const WITH_DEPENDENCY: &str = "\
[mock]
url = https://git.example.com/mock-settings.git
ref = master
roots = epel-7-x86_64

[sshbackup]
remotehost = backup.example.com
remotedir = /srv/rpmbuilder

[lib]
type = project
url = https://git.example.com/lib.git
ref = master

[app]
type = project
url = https://git.example.com/app.git
ref = master
";

    /// A project section missing its mandatory `ref`.
    pub const MISSING_REF: &str = "\
[helloworld]
type = project
url = https://git.example.com/helloworld.git
";

    /// Section name with characters that are not allowed.
    pub const ILLEGAL_SECTION: &str = "\
[hello_world]
type = project
url = https://git.example.com/helloworld.git
ref = master
";
}

/// A test fixture that provides a temporary directory with optional config.
///
/// This struct simplifies the common pattern of creating a temp directory
/// and populating it with a `build.ini` configuration file.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `build.ini` configuration file with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.temp_dir
            .child("build.ini")
            .write_str(content)
            .expect("Failed to write config file");
        self
    }

    /// Add a file with the given path and content.
    #[allow(dead_code)]
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.temp_dir.path().join("build.ini")
    }

    /// Get the path of the workspace directory used by commands.
    #[allow(dead_code)]
    pub fn workspace_path(&self) -> PathBuf {
        self.temp_dir.path().join("workspace")
    }

    /// Create a command running in this fixture's directory, isolated from
    /// any `RPMBUILDER_*` variables of the calling environment.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("rpmbuilder");
        cmd.current_dir(self.path())
            .env_remove("RPMBUILDER_WORKSPACE")
            .env_remove("RPMBUILDER_CONFIG")
            .env_remove("RPMBUILDER_MOCKCONF")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_fixture_with_config() {
        let fixture = TestFixture::new().with_config(configs::HELLOWORLD);
        assert!(fixture.config_path().exists());
    }

    #[test]
    fn test_valid_configs_parse() {
        for content in [
            configs::HELLOWORLD,
            configs::WITHOUT_MOCK,
            configs::WITH_DEPENDENCY,
        ] {
            rpmbuilder::config::parse(content).expect("Config should parse");
        }
    }

    #[test]
    fn test_broken_configs_are_rejected() {
        assert!(rpmbuilder::config::parse(configs::MISSING_REF).is_err());
        assert!(rpmbuilder::config::parse(configs::ILLEGAL_SECTION).is_err());
    }
}
