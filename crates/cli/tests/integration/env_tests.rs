//! `pinenv env` activation scripts.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn bash_script_exports_variables_and_path() {
  let env = TestEnv::from_fixtures();

  env
    .pinenv_cmd("env")
    .args(["--platform", "x86_64-linux", "--shell", "bash"])
    .assert()
    .success()
    .stdout(predicate::str::starts_with("#!/usr/bin/env bash\n"))
    .stdout(predicate::str::contains("# pinenv environment for x86_64-linux (2 packages)"))
    .stdout(predicate::str::contains(r#"export RUST_BACKTRACE="1""#))
    .stdout(predicate::str::contains("-rustToolchain-1.88.0/lib/rustlib/src/rust/library\""))
    .stdout(predicate::str::contains("-ripgrep-14.1.0/etc/ripgreprc\""))
    .stdout(predicate::str::contains("-ripgrep-14.1.0/bin\":\"$PATH\""));
}

#[test]
fn fish_script_uses_set() {
  let env = TestEnv::from_fixtures();

  env
    .pinenv_cmd("env")
    .args(["--platform", "aarch64-darwin", "--shell", "fish"])
    .assert()
    .success()
    .stdout(predicate::str::contains("set -gx RUST_BACKTRACE"));
}

#[test]
fn env_never_writes_the_lock_file() {
  let env = TestEnv::from_fixtures();

  env
    .pinenv_cmd("env")
    .args(["--platform", "x86_64-linux", "--shell", "sh"])
    .assert()
    .success();
  assert!(!env.lock_path().exists());
}

#[test]
fn json_output_is_the_environment_descriptor() {
  let env = TestEnv::from_fixtures();

  let output = env
    .pinenv_cmd("env")
    .args(["--platform", "x86_64-linux", "-o", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["platform"], "x86_64-linux");
  assert_eq!(json["packages"][0]["name"], "rustToolchain");
  assert_eq!(json["packages"][1]["name"], "ripgrep");
  assert!(json["storePaths"]["rustToolchain"].as_str().unwrap().ends_with("-rustToolchain-1.88.0"));
}

#[test]
fn unavailable_package_fails() {
  let env = TestEnv::from_fixtures();
  env.edit_config(|config| {
    config["shell"]["packages"] = serde_json::json!(["ripgrep", "fd"]);
  });

  env
    .pinenv_cmd("env")
    .args(["--platform", "x86_64-linux", "--shell", "bash"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("not available on x86_64-linux: fd"));
}

#[test]
fn unknown_shell_is_rejected() {
  let env = TestEnv::from_fixtures();

  env
    .pinenv_cmd("env")
    .args(["--shell", "tcsh"])
    .assert()
    .failure();
}
