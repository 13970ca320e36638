// Command integration tests for the Lion CLI
//
// These tests run the binary against policy and configuration files in a
// temporary directory and check its output and exit status.

use assert_cmd::Command as TestCommand;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

// Helper function to get the command
fn cmd() -> TestCommand {
    let mut cmd = TestCommand::cargo_bin("lion_cli").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, policy: &str) -> std::path::PathBuf {
    fs::write(dir.join("conditional.policy"), policy).unwrap();
    let config = dir.join("lion.toml");
    fs::write(
        &config,
        r#"
log_level = "warn"
storage = "conditional.policy"
implied = ['(property "lion.version" "read")']
default_permissions = ['(property "app.*" "read")']

[locations]
"file:/opt/admin.jar" = ['(all)']
"#,
    )
    .unwrap();
    config
}

#[test]
fn test_policy_add_list_remove() {
    let temp_dir = tempdir().unwrap();
    let policy = temp_dir.path().join("conditional.policy");

    cmd()
        .args(["policy", "list"])
        .arg(&policy)
        .assert()
        .success()
        .stdout(predicate::str::contains("No policy entries defined"));

    cmd()
        .args(["policy", "add"])
        .arg(&policy)
        .arg(r#"[tmp]{ [location "file:/opt/*"] (file "/tmp/-" "read") }"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("Policy entry added successfully"));

    let stored = fs::read_to_string(&policy).unwrap();
    assert_eq!(stored.trim(), r#"[tmp]{ [location "file:/opt/*"] (file "/tmp/-" "read") }"#);

    cmd()
        .args(["policy", "list"])
        .arg(&policy)
        .assert()
        .success()
        .stdout(predicate::str::contains("tmp"))
        .stdout(predicate::str::contains("1 policy entries found"));

    cmd()
        .args(["policy", "remove"])
        .arg(&policy)
        .arg("tmp")
        .assert()
        .success()
        .stdout(predicate::str::contains("Policy entry removed successfully"));

    assert_eq!(fs::read_to_string(&policy).unwrap().trim(), "");
}

#[test]
fn test_policy_add_rejects_bad_entries() {
    let temp_dir = tempdir().unwrap();
    let policy = temp_dir.path().join("conditional.policy");

    cmd()
        .args(["policy", "add"])
        .arg(&policy)
        .arg(r#"{ (file "/tmp) }"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unterminated quote"));

    cmd().args(["policy", "add"]).arg(&policy).arg("[a]{ (all) }").assert().success();
    cmd()
        .args(["policy", "add"])
        .arg(&policy)
        .arg("[a]{ }")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    cmd()
        .args(["policy", "remove"])
        .arg(&policy)
        .arg("missing")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_policy_validate() {
    let temp_dir = tempdir().unwrap();
    let good = temp_dir.path().join("good.policy");
    fs::write(&good, "# comment\n{ (all) }\n[n]{ [location \"*\"] }\n").unwrap();

    cmd()
        .args(["policy", "validate"])
        .arg(&good)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 policy entries are valid"));

    let bad = temp_dir.path().join("bad.policy");
    fs::write(&bad, "{ (all) }\n{ (all)\n").unwrap();

    cmd()
        .args(["policy", "validate"])
        .arg(&bad)
        .assert()
        .failure()
        .stdout(predicate::str::contains("entry 2"))
        .stderr(predicate::str::contains("1 of 2 policy entries are malformed"));
}

#[test]
fn test_check_decisions() {
    let temp_dir = tempdir().unwrap();
    let config = write_config(
        temp_dir.path(),
        "[tmp]{ [location \"file:/opt/*\"] (file \"/tmp/-\" \"read\") }\n",
    );

    // Conditional policy applies to bundles under /opt.
    cmd()
        .arg("--config")
        .arg(&config)
        .args(["check", "--location", "file:/opt/app.jar", "file", "/tmp/x", "read"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("GRANTED"))
        .stdout(predicate::str::contains("conditional policy"));

    cmd()
        .arg("--config")
        .arg(&config)
        .args(["check", "--location", "file:/opt/app.jar", "file", "/tmp/x", "write"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("DENIED"));

    // Elsewhere the entry is pruned and the default assignment decides.
    cmd()
        .arg("--config")
        .arg(&config)
        .args(["check", "--location", "file:/home/app.jar", "property", "app.name", "read"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("default permissions"));

    cmd()
        .arg("--config")
        .arg(&config)
        .args(["check", "--location", "file:/opt/admin.jar", "runtime", "exit"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("location permissions"));

    cmd()
        .arg("--config")
        .arg(&config)
        .args(["check", "--location", "file:/home/app.jar", "property", "lion.version", "read"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("implied permissions"));
}

#[test]
fn test_check_requires_config() {
    cmd()
        .args(["check", "--location", "file:/a.jar", "all"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--config"));
}

#[test]
fn test_check_unknown_permission_type() {
    let temp_dir = tempdir().unwrap();
    let config = write_config(temp_dir.path(), "");

    cmd()
        .arg("--config")
        .arg(&config)
        .args(["check", "--location", "file:/a.jar", "socket", "host", "connect"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown type: socket"));
}
