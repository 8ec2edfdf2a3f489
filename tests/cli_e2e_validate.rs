//! End-to-end tests for the `validate` command.
//!
//! These tests invoke the actual CLI binary and validate the behavior of the
//! `validate` subcommand from a user's perspective.

#[allow(dead_code)]
mod common;
use common::prelude::*;

#[test]
fn test_validate_valid_config() {
    let fixture = TestFixture::new().with_config(configs::WITH_DEPENDENCY);

    fixture
        .command()
        .arg("validate")
        .arg("--config")
        .arg(fixture.config_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK] Configuration file parsed successfully"))
        .stdout(predicate::str::contains("Enabled: lib, app"))
        .stdout(predicate::str::contains("epel-7-x86_64"))
        .stdout(predicate::str::contains("Backup: backup.example.com:/srv/rpmbuilder"));
}

#[test]
fn test_validate_reads_config_from_env() {
    let fixture = TestFixture::new().with_config(configs::HELLOWORLD);

    fixture
        .command()
        .env("RPMBUILDER_CONFIG", fixture.config_path())
        .arg("validate")
        .assert()
        .success();
}

#[test]
fn test_validate_illegal_section_name() {
    let fixture = TestFixture::new().with_config(configs::ILLEGAL_SECTION);

    fixture
        .command()
        .arg("validate")
        .arg("--config")
        .arg(fixture.config_path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("illegal characters"));
}

#[test]
fn test_validate_disabled_project() {
    let fixture = TestFixture::new().with_config(
        "[helloworld]\n\
         type = project\n\
         url = https://git.example.com/helloworld.git\n\
         ref = master\n\
         enabled = false\n",
    );

    fixture
        .command()
        .arg("validate")
        .arg("--config")
        .arg(fixture.config_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Disabled: helloworld"))
        .stdout(predicate::str::contains("No enabled projects"));
}

#[test]
fn test_validate_strict_fails_on_warnings() {
    let fixture = TestFixture::new().with_config(configs::WITHOUT_MOCK);

    fixture
        .command()
        .arg("validate")
        .arg("--strict")
        .arg("--config")
        .arg(fixture.config_path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("No [mock] section"));
}

#[test]
fn test_validate_bad_boolean() {
    let fixture = TestFixture::new().with_config(
        "[helloworld]\n\
         type = project\n\
         url = https://git.example.com/helloworld.git\n\
         ref = master\n\
         enabled = maybe\n",
    );

    fixture
        .command()
        .arg("validate")
        .arg("--config")
        .arg(fixture.config_path())
        .assert()
        .failure();
}
