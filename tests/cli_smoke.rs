//! CLI smoke tests for the scriptapk binary.

mod common;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn scriptapk() -> Command {
    let mut cmd = cargo_bin_cmd!("scriptapk");
    cmd.env_remove("SCRIPTAPK_TEMPLATE")
        .env_remove("SCRIPTAPK_SIGNING_KEY");
    cmd
}

#[test]
fn help_lists_subcommands() {
    scriptapk()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("keygen"));
}

#[test]
fn init_scaffolds_project() {
    let dir = TempDir::new().unwrap();
    let project = dir.path().join("demo");

    scriptapk()
        .args(["init", "--name", "Demo", "--package-name", "com.example.demo"])
        .arg(&project)
        .assert()
        .success()
        .stdout(predicate::str::contains("Project ready"));

    assert!(project.join("project.json").is_file());
    assert!(project.join("main.js").is_file());
}

#[test]
fn init_rejects_bad_package_name() {
    let dir = TempDir::new().unwrap();

    scriptapk()
        .args(["init", "--name", "Demo", "--package-name", "demo"])
        .arg(dir.path().join("demo"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid package name"));

    assert!(!dir.path().join("demo").exists());
}

#[test]
fn keygen_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let key = dir.path().join("release.pem");

    scriptapk()
        .arg("keygen")
        .arg(&key)
        .assert()
        .success()
        .stdout(predicate::str::contains("fingerprint"));
    let first = std::fs::read(&key).unwrap();

    scriptapk()
        .arg("keygen")
        .arg(&key)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--force"));
    assert_eq!(std::fs::read(&key).unwrap(), first);

    scriptapk()
        .args(["keygen", "--force"])
        .arg(&key)
        .assert()
        .success();
    assert_ne!(std::fs::read(&key).unwrap(), first);
}

#[test]
fn build_then_verify() {
    let dir = TempDir::new().unwrap();
    let template = common::template_apk(dir.path());
    let project = common::project(dir.path());
    let key = dir.path().join("release.pem");
    let output = dir.path().join("Tool.apk");

    let keygen = scriptapk().arg("keygen").arg(&key).output().unwrap();
    assert!(keygen.status.success());
    let stdout = String::from_utf8(keygen.stdout).unwrap();
    let fingerprint = stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("fingerprint: "))
        .unwrap()
        .to_string();

    scriptapk()
        .arg("build")
        .arg(&project)
        .arg("--template")
        .arg(&template)
        .arg("--key")
        .arg(&key)
        .arg("--output")
        .arg(&output)
        .arg("--workspace")
        .arg(dir.path().join("ws"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Built"));

    assert!(!dir.path().join("ws").exists());

    scriptapk()
        .arg("verify")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("is signed"))
        .stdout(predicate::str::contains(fingerprint));

    let sealed = dir.path().join("main.js.enc");
    std::fs::write(&sealed, common::read_entry(&output, "assets/project/main.js")).unwrap();
    scriptapk()
        .arg("inspect")
        .arg(&sealed)
        .arg("--project")
        .arg(&project)
        .assert()
        .success()
        .stdout(predicate::str::ends_with("X"));
}

#[test]
fn build_rejects_non_apk_output() {
    scriptapk()
        .args(["build", "proj", "--template", "t.apk", "--output", "out.zip"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid arguments"));
}

#[test]
fn build_reports_missing_descriptor() {
    let dir = TempDir::new().unwrap();
    let template = common::template_apk(dir.path());
    let empty = dir.path().join("empty");
    std::fs::create_dir_all(&empty).unwrap();

    scriptapk()
        .arg("build")
        .arg(&empty)
        .arg("--template")
        .arg(&template)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no project descriptor"));
}

#[test]
fn build_refuses_project_as_workspace() {
    let dir = TempDir::new().unwrap();
    let template = common::template_apk(dir.path());
    let project = common::project(dir.path());

    scriptapk()
        .arg("build")
        .arg(&project)
        .arg("--template")
        .arg(&template)
        .arg("--workspace")
        .arg(&project)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("overlaps"));

    assert!(project.join("project.json").is_file());
    assert!(project.join("build/Tool_v0.9.apk").is_file());
    assert_eq!(std::fs::read_to_string(project.join("main.js")).unwrap(), "X");
}

#[test]
fn verify_rejects_unsigned_package() {
    let dir = TempDir::new().unwrap();
    let template = common::template_apk(dir.path());

    scriptapk()
        .arg("verify")
        .arg(&template)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("signature verification failed"));
}
