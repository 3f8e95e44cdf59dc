//! The `pinenv.json` configuration file.
//!
//! ```json
//! {
//!   "inputs": {
//!     "nixpkgs": { "url": "github:nixos/nixpkgs/nixos-24.05", "pin": "hash123" },
//!     "pkgs": { "follows": "nixpkgs" }
//!   },
//!   "repository": { "input": "pkgs", "path": "./packages.json" },
//!   "overlays": [
//!     { "name": "rust", "packages": { "rustToolchain": { "version": "1.88.0" } } }
//!   ],
//!   "platforms": ["x86_64-linux"],
//!   "shell": { "packages": ["rustToolchain"], "env": { "RUST_BACKTRACE": "1" } },
//!   "failFast": false
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::CONFIG_FILENAME;
use crate::inputs::{InputDecl, InputDecls};
use crate::overlay::OverlayDecl;
use crate::platform::{Platform, paths};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {path}")]
  NotFound { path: String },

  #[error("failed to read config '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse config '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Where base package sets come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RepositoryConfig {
  /// The input whose pin selects the snapshot.
  pub input: String,
  /// Snapshot file, relative to the config file.
  pub path: PathBuf,
}

/// What the environment exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ShellConfig {
  /// Selected package names, in activation order.
  #[serde(default)]
  pub packages: Vec<String>,
  /// Variables that override package contributions.
  #[serde(default)]
  pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
  #[serde(default, deserialize_with = "unique_inputs")]
  pub inputs: InputDecls,

  pub repository: RepositoryConfig,

  /// Applied in list order.
  #[serde(default)]
  pub overlays: Vec<OverlayDecl>,

  /// Platforms to resolve. All supported platforms if absent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub platforms: Option<Vec<Platform>>,

  #[serde(default)]
  pub shell: ShellConfig,

  #[serde(default)]
  pub fail_fast: bool,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub store_dir: Option<PathBuf>,
}

impl Config {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| {
      if source.kind() == io::ErrorKind::NotFound {
        ConfigError::NotFound {
          path: path.display().to_string(),
        }
      } else {
        ConfigError::Read {
          path: path.to_path_buf(),
          source,
        }
      }
    })?;

    let config: Config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    debug!(
      path = %path.display(),
      inputs = config.inputs.len(),
      overlays = config.overlays.len(),
      "loaded config"
    );
    Ok(config)
  }

  /// Configured platforms, or every supported platform.
  pub fn platforms(&self) -> Vec<Platform> {
    self.platforms.clone().unwrap_or_else(Platform::supported)
  }

  /// Store root: `storeDir` (relative to `config_dir`), then `PINENV_STORE`, then the default.
  pub fn store_dir(&self, config_dir: &Path) -> PathBuf {
    match &self.store_dir {
      Some(dir) => config_dir.join(dir),
      None => paths::store_dir(),
    }
  }

  pub fn repository_path(&self, config_dir: &Path) -> PathBuf {
    config_dir.join(&self.repository.path)
  }
}

/// JSON objects may repeat keys. Inputs must not.
fn unique_inputs<'de, D>(deserializer: D) -> Result<InputDecls, D::Error>
where
  D: Deserializer<'de>,
{
  struct UniqueInputs;

  impl<'de> Visitor<'de> for UniqueInputs {
    type Value = InputDecls;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
      f.write_str("a map of input names to declarations")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
      A: MapAccess<'de>,
    {
      let mut decls = InputDecls::new();
      while let Some((name, decl)) = map.next_entry::<String, InputDecl>()? {
        if decls.contains_key(&name) {
          return Err(serde::de::Error::custom(format!("input '{name}' is declared more than once")));
        }
        decls.insert(name, decl);
      }
      Ok(decls)
    }
  }

  deserializer.deserialize_map(UniqueInputs)
}

/// Find the config file.
///
/// 1. `explicit`, which must exist
/// 2. `./pinenv.json`
/// 3. `pinenv.json` in the user config directory
pub fn find_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
  if let Some(path) = explicit {
    if path.exists() {
      return Ok(path.to_path_buf());
    }
    return Err(ConfigError::NotFound {
      path: path.display().to_string(),
    });
  }

  let cwd_config = PathBuf::from(".").join(CONFIG_FILENAME);
  if cwd_config.exists() {
    return Ok(cwd_config);
  }

  let user_config = paths::user_config_path();
  if user_config.exists() {
    return Ok(user_config);
  }

  Err(ConfigError::NotFound {
    path: format!(
      "{CONFIG_FILENAME} (tried ./{CONFIG_FILENAME} and {})",
      user_config.display()
    ),
  })
}

/// Directory relative paths in a config resolve against.
pub fn config_dir(config_path: &Path) -> PathBuf {
  match config_path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => PathBuf::from("."),
  }
}
