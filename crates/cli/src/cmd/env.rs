use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use pinenv_lib::activation::{Shell, render};
use pinenv_lib::engine::{Engine, LockMode};
use pinenv_lib::platform::Platform;

use super::load_config;
use crate::output::{OutputFormat, print_json};

/// Resolve a single platform and print its activation script.
///
/// Meant for `eval "$(pinenv env)"`, so nothing but the script goes to stdout
/// and the lock file is never written.
pub fn cmd_env(
  config: Option<&Path>,
  platform: Option<Platform>,
  shell: Option<Shell>,
  output: OutputFormat,
) -> Result<()> {
  let (config, config_dir) = load_config(config)?;
  let platform = match platform {
    Some(platform) => platform,
    None => Platform::current().ok_or_else(|| anyhow!("unsupported host platform, pass --platform"))?,
  };

  let engine = Engine::from_config(&config, &config_dir, LockMode::ReadOnly).context("Failed to prepare resolution")?;
  let pinned = engine.pinned_inputs()?;
  let env = engine
    .environment(platform, &pinned)
    .with_context(|| format!("Failed to resolve environment for {platform}"))?;

  if output.is_json() {
    return print_json(&env);
  }

  let shell = shell.unwrap_or_else(Shell::detect);
  debug!(%shell, %platform, "rendering activation script");
  print!("{}", render(&env, shell));
  Ok(())
}
