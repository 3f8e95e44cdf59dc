//! Shared test helpers for CLI integration tests.

use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// Read fixture content.
pub fn fixture_content(name: &str) -> String {
  std::fs::read_to_string(fixture_path(name)).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Isolated test environment.
///
/// Each test gets its own directory holding `pinenv.json`, `packages.json`
/// and a `local/` input.
pub struct TestEnv {
  pub temp: TempDir,
  pub config_path: PathBuf,
}

impl TestEnv {
  /// Copy the fixture config and package snapshots into a temp directory.
  pub fn from_fixtures() -> Self {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("pinenv.json");
    std::fs::write(&config_path, fixture_content("pinenv.json")).unwrap();
    std::fs::write(temp.path().join("packages.json"), fixture_content("packages.json")).unwrap();

    let env = Self { temp, config_path };
    env.write_file("local/overlay.txt", "local sources\n");
    env
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Rewrite the config with `f` applied to its JSON.
  pub fn edit_config(&self, f: impl FnOnce(&mut serde_json::Value)) {
    let content = std::fs::read_to_string(&self.config_path).unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&content).unwrap();
    f(&mut value);
    std::fs::write(&self.config_path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
  }

  pub fn lock_path(&self) -> PathBuf {
    self.temp.path().join("pinenv.lock")
  }

  /// A `pinenv` command pointed at this environment's config.
  pub fn pinenv_cmd(&self, subcommand: &str) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("pinenv");
    cmd.current_dir(self.temp.path());
    cmd.env_remove("PINENV_STORE");
    cmd.env_remove("PINENV_JOBS");
    cmd.env("NO_COLOR", "1");
    cmd.arg(subcommand).arg("--config").arg(&self.config_path);
    cmd
  }
}
