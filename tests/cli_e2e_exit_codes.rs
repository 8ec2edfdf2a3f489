//! End-to-end tests for CLI exit codes.
//!
//! - Exit code 0: Success, including runs with nothing to build
//! - Exit code 1: Any failure, fatal or per project
//! - Exit code 2: Invalid command-line usage (handled by clap)

#[allow(dead_code)]
mod common;
use common::prelude::*;

/// Exit code 0 is returned for successful operations.
#[test]
fn test_exit_code_success() {
    let fixture = TestFixture::new().with_config(configs::HELLOWORLD);

    fixture
        .command()
        .arg("validate")
        .arg("--config")
        .arg(fixture.config_path())
        .assert()
        .code(0);
}

/// Exit code 0 is returned for --help.
#[test]
fn test_exit_code_help() {
    let mut cmd = cargo_bin_cmd!("rpmbuilder");

    cmd.arg("--help").assert().code(0);
}

/// Exit code 0 is returned for --version.
#[test]
fn test_exit_code_version() {
    let mut cmd = cargo_bin_cmd!("rpmbuilder");

    cmd.arg("--version").assert().code(0);
}

/// Exit code 1 is returned for configuration file not found.
#[test]
fn test_exit_code_error_config_not_found() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("validate")
        .arg("--config")
        .arg("nonexistent.ini")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration parsing failed"));
}

/// Exit code 1 is returned for a configuration missing mandatory fields.
#[test]
fn test_exit_code_error_missing_field() {
    let fixture = TestFixture::new().with_config(configs::MISSING_REF);

    fixture
        .command()
        .arg("validate")
        .arg("--config")
        .arg(fixture.config_path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ref"));
}

/// Exit code 1 is returned when a build has no mock configuration at all.
#[test]
fn test_exit_code_error_no_mock_configuration() {
    let fixture = TestFixture::new().with_config(configs::WITHOUT_MOCK);

    fixture
        .command()
        .env("HOME", fixture.path())
        .env("XDG_CONFIG_HOME", fixture.path().join("config"))
        .arg("build")
        .arg("-w")
        .arg(fixture.workspace_path())
        .arg("-c")
        .arg(fixture.config_path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No mock configuration"));
}

/// Exit code 1 is returned for a local directory without spec files.
#[test]
fn test_exit_code_error_local_without_spec() {
    let fixture = TestFixture::new().with_file("helloworld/README", "hello");

    fixture
        .command()
        .arg("local")
        .arg("-w")
        .arg(fixture.workspace_path())
        .arg("--mockconf")
        .arg(fixture.path().join("epel-7-x86_64.cfg"))
        .arg(fixture.path().join("helloworld"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No spec file"));
}

/// Exit code 1 is returned when stashing something that is not a workspace.
#[test]
fn test_exit_code_error_stash_not_a_workspace() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("stash")
        .arg("-w")
        .arg(fixture.path())
        .arg("--remote-host")
        .arg("backup.example.com")
        .arg("--remote-dir")
        .arg("/srv/rpmbuilder")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not a build workspace"));
}

/// Exit code 2 is returned for an unknown subcommand.
#[test]
fn test_exit_code_usage_unknown_command() {
    let mut cmd = cargo_bin_cmd!("rpmbuilder");

    cmd.arg("nonexistent-command").assert().code(2);
}

/// Exit code 2 is returned when a required option is missing.
#[test]
fn test_exit_code_usage_missing_workspace() {
    let fixture = TestFixture::new().with_config(configs::HELLOWORLD);

    fixture
        .command()
        .arg("build")
        .arg("-c")
        .arg(fixture.config_path())
        .assert()
        .code(2);
}

/// Exit code 2 is returned for a backup host without a backup directory.
#[test]
fn test_exit_code_usage_remote_host_without_dir() {
    let fixture = TestFixture::new().with_config(configs::HELLOWORLD);

    fixture
        .command()
        .arg("build")
        .arg("-w")
        .arg(fixture.workspace_path())
        .arg("-c")
        .arg(fixture.config_path())
        .arg("--remote-host")
        .arg("backup.example.com")
        .assert()
        .code(2);
}

/// Exit code 2 is returned for an unknown remote function.
#[test]
fn test_exit_code_usage_bad_remote_function() {
    let fixture = TestFixture::new().with_config(configs::HELLOWORLD);

    fixture
        .command()
        .arg("build")
        .arg("-w")
        .arg(fixture.workspace_path())
        .arg("-c")
        .arg(fixture.config_path())
        .arg("--remote-function")
        .arg("push")
        .assert()
        .code(2);
}
