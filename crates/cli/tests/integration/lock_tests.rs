//! `pinenv lock` and `pinenv inputs`.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn lock_pins_concrete_inputs() {
  let env = TestEnv::from_fixtures();

  env
    .pinenv_cmd("lock")
    .assert()
    .success()
    .stdout(predicate::str::contains("Added: local"))
    .stdout(predicate::str::contains("Added: nixpkgs"))
    .stdout(predicate::str::contains("Lock file updated"));

  let lock: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(env.lock_path()).unwrap()).unwrap();
  assert_eq!(lock["version"], 1);
  assert_eq!(lock["inputs"]["nixpkgs"]["pin"], "hash123");
  assert_eq!(lock["inputs"]["local"]["type"], "path");
  assert!(lock["inputs"]["local"]["pin"].as_str().unwrap().starts_with("sha256:"));
  assert!(lock["inputs"].get("pkgs").is_none());
}

#[test]
fn second_lock_is_a_no_op() {
  let env = TestEnv::from_fixtures();

  env.pinenv_cmd("lock").assert().success();
  env
    .pinenv_cmd("lock")
    .assert()
    .success()
    .stdout(predicate::str::contains("All inputs are pinned"));
}

#[test]
fn dry_run_writes_nothing() {
  let env = TestEnv::from_fixtures();

  env
    .pinenv_cmd("lock")
    .arg("--dry-run")
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run"))
    .stdout(predicate::str::contains("Would add: local"));
  assert!(!env.lock_path().exists());
}

#[test]
fn relock_picks_up_changed_path_input() {
  let env = TestEnv::from_fixtures();
  env.pinenv_cmd("lock").assert().success();

  env.write_file("local/overlay.txt", "changed\n");

  env
    .pinenv_cmd("lock")
    .assert()
    .success()
    .stdout(predicate::str::contains("All inputs are pinned"));

  env
    .pinenv_cmd("lock")
    .arg("local")
    .assert()
    .success()
    .stdout(predicate::str::contains("Updated: local"));
}

#[test]
fn unknown_input_name_fails() {
  let env = TestEnv::from_fixtures();

  env
    .pinenv_cmd("lock")
    .arg("nope")
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown input 'nope'"));
}

#[test]
fn inputs_shows_alias_chain() {
  let env = TestEnv::from_fixtures();
  env.pinenv_cmd("lock").assert().success();

  env
    .pinenv_cmd("inputs")
    .assert()
    .success()
    .stdout(predicate::str::contains("pkgs nixpkgs (github:nixos/nixpkgs/nixos-24.05 hash123)"));
}

#[test]
fn inputs_reports_cyclic_alias() {
  let env = TestEnv::from_fixtures();
  env.edit_config(|config| {
    config["inputs"]["a"] = serde_json::json!({ "follows": "b" });
    config["inputs"]["b"] = serde_json::json!({ "follows": "a" });
  });
  env.pinenv_cmd("lock").assert().success();

  let output = env.pinenv_cmd("inputs").args(["-o", "json"]).output().unwrap();
  assert!(!output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let entries = json.as_array().unwrap();
  let a = entries.iter().find(|e| e["name"] == "a").unwrap();
  assert!(a["error"].as_str().unwrap().contains("a -> b -> a"));
  let nixpkgs = entries.iter().find(|e| e["name"] == "nixpkgs").unwrap();
  assert_eq!(nixpkgs["pin"], "hash123");
}
