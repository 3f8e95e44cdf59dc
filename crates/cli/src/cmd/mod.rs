mod env;
mod info;
mod inputs;
mod lock;
mod resolve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pinenv_lib::config::{Config, config_dir, find_config_path};

pub use env::cmd_env;
pub use info::cmd_info;
pub use inputs::cmd_inputs;
pub use lock::cmd_lock;
pub use resolve::{ResolveArgs, cmd_resolve};

/// Locate and parse the config. Returns it with the directory its relative paths resolve against.
fn load_config(explicit: Option<&Path>) -> Result<(Config, PathBuf)> {
  let config_path = find_config_path(explicit).context("Failed to find config file")?;
  let config =
    Config::load(&config_path).with_context(|| format!("Failed to load config '{}'", config_path.display()))?;
  Ok((config, config_dir(&config_path)))
}
