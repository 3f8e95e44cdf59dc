//! Lock file management for input pins.
//!
//! The lock file (`pinenv.lock`) records the pin of every concrete input so
//! that later runs resolve against the same sources. It lives next to the
//! configuration file.
//!
//! # Lock File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "inputs": {
//!     "nixpkgs": {
//!       "type": "github",
//!       "url": "github:nixos/nixpkgs/nixos-24.05",
//!       "pin": "sha256:9f86d08...",
//!       "lastModified": 1733667300
//!     }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::types::{InputDecls, locator_scheme};
use crate::repository::{FetchError, PackageRepository, resolve_path};
use crate::util::hash::{DirHashError, hash_bytes, hash_directory, hash_file};

/// Current lock file format version.
pub const LOCK_VERSION: u32 = 1;

/// Lock file name.
pub const LOCK_FILENAME: &str = "pinenv.lock";

/// Directory entries skipped when hashing `path:` inputs.
const PATH_HASH_EXCLUDES: &[&str] = &[".git", LOCK_FILENAME];

/// A lock file containing pinned inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
  /// Lock file format version.
  pub version: u32,
  /// Locked inputs, keyed by input name.
  pub inputs: BTreeMap<String, LockedInput>,
}

/// A locked input entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedInput {
  /// Locator scheme, e.g. "github" or "path".
  #[serde(rename = "type")]
  pub type_: String,

  /// URL as written in the configuration.
  pub url: String,

  /// The pin recorded for this URL.
  pub pin: String,

  /// Unix timestamp of when this entry was written.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_modified: Option<u64>,
}

/// Errors that can occur when working with lock files.
#[derive(Debug, Error)]
pub enum LockError {
  #[error("failed to read lock file: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write lock file: {0}")]
  Write(#[source] io::Error),

  #[error("failed to parse lock file: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize lock file: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported lock file version {0}, expected {LOCK_VERSION}")]
  UnsupportedVersion(u32),

  /// The configuration changed an input's URL since it was locked.
  #[error("input '{name}' URL changed from '{locked_url}' to '{config_url}'. Run 'pinenv lock {name}' to update.")]
  Mismatch {
    name: String,
    locked_url: String,
    config_url: String,
  },

  /// Fetching an input in order to pin it failed.
  #[error("failed to pin input '{name}': {source}")]
  Fetch {
    name: String,
    #[source]
    source: FetchError,
  },

  /// Hashing a `path:` input failed.
  #[error("failed to hash input '{name}': {source}")]
  Hash {
    name: String,
    #[source]
    source: DirHashError,
  },
}

impl Default for LockFile {
  fn default() -> Self {
    Self::new()
  }
}

impl LockFile {
  /// Create a new empty lock file.
  pub fn new() -> Self {
    Self {
      version: LOCK_VERSION,
      inputs: BTreeMap::new(),
    }
  }

  /// Load a lock file from the given path.
  ///
  /// Returns `Ok(None)` if the file doesn't exist.
  pub fn load(path: &Path) -> Result<Option<Self>, LockError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(LockError::Read(e)),
    };

    let lock: LockFile = serde_json::from_str(&content).map_err(LockError::Parse)?;

    if lock.version != LOCK_VERSION {
      return Err(LockError::UnsupportedVersion(lock.version));
    }

    Ok(Some(lock))
  }

  /// Save the lock file to the given path.
  ///
  /// Written to a temporary file in the same directory and renamed into place.
  pub fn save(&self, path: &Path) -> Result<(), LockError> {
    let mut content = serde_json::to_string_pretty(self).map_err(LockError::Serialize)?;
    content.push('\n');

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(LockError::Write)?;
    tmp.write_all(content.as_bytes()).map_err(LockError::Write)?;
    tmp.persist(path).map_err(|e| LockError::Write(e.error))?;
    Ok(())
  }

  /// Get a locked input by name.
  pub fn get(&self, name: &str) -> Option<&LockedInput> {
    self.inputs.get(name)
  }

  /// Insert or update a locked input.
  pub fn insert(&mut self, name: String, input: LockedInput) {
    self.inputs.insert(name, input);
  }
}

impl LockedInput {
  /// Create a new locked input entry.
  pub fn new(type_: &str, url: &str, pin: &str) -> Self {
    Self {
      type_: type_.to_string(),
      url: url.to_string(),
      pin: pin.to_string(),
      last_modified: None,
    }
  }

  /// Set the last modified timestamp.
  pub fn with_last_modified(mut self, timestamp: u64) -> Self {
    self.last_modified = Some(timestamp);
    self
  }
}

/// Outcome of [`lock_inputs`].
#[derive(Debug)]
pub struct LockResult {
  /// The updated lock file.
  pub lock_file: LockFile,
  /// Whether the lock file differs from the one passed in.
  pub changed: bool,
  /// Inputs whose pin changed: name -> (old pin, new pin).
  pub updated: BTreeMap<String, (String, String)>,
  /// Inputs that were not locked before.
  pub added: Vec<String>,
  /// Lock entries dropped because the input is gone or became an alias.
  pub removed: Vec<String>,
}

/// Pin every concrete input.
///
/// For each concrete input, in order of precedence:
/// 1. a pin written in the configuration
/// 2. the pin of a lock entry with the same URL (unless force-updated)
/// 3. a freshly computed content hash
///
/// `force_update`:
/// - `None`: keep locked pins
/// - `Some(empty set)`: recompute every pin not given in the configuration
/// - `Some(names)`: recompute only those
pub fn lock_inputs(
  decls: &InputDecls,
  existing: Option<&LockFile>,
  repo: &dyn PackageRepository,
  config_dir: &Path,
  force_update: Option<&BTreeSet<String>>,
) -> Result<LockResult, LockError> {
  let mut lock_file = existing.cloned().unwrap_or_default();
  let mut result_updated = BTreeMap::new();
  let mut added = Vec::new();

  for (name, decl) in decls {
    let Some(url) = decl.url() else {
      continue;
    };

    let should_force = force_update
      .map(|set| set.is_empty() || set.contains(name))
      .unwrap_or(false);
    let locked = lock_file.get(name).cloned();

    if !should_force
      && let Some(locked) = &locked
      && locked.url != url
    {
      return Err(LockError::Mismatch {
        name: name.clone(),
        locked_url: locked.url.clone(),
        config_url: url.to_string(),
      });
    }

    let pin = match (decl.pin(), &locked) {
      (Some(pin), _) => pin.to_string(),
      (None, Some(locked)) if !should_force => locked.pin.clone(),
      (None, _) => compute_pin(name, url, repo, config_dir)?,
    };

    match &locked {
      Some(locked) if locked.pin == pin && locked.url == url => {
        debug!(name, pin = %pin, "input already locked");
        continue;
      }
      Some(locked) => {
        info!(name, old = %locked.pin, new = %pin, "updating locked input");
        result_updated.insert(name.clone(), (locked.pin.clone(), pin.clone()));
      }
      None => {
        info!(name, pin = %pin, "locking input");
        added.push(name.clone());
      }
    }

    lock_file.insert(
      name.clone(),
      LockedInput::new(locator_scheme(url), url, &pin).with_last_modified(unix_now()),
    );
  }

  let stale: Vec<String> = lock_file
    .inputs
    .keys()
    .filter(|name| decls.get(*name).and_then(|d| d.url()).is_none())
    .cloned()
    .collect();

  for name in &stale {
    warn!(name = %name, "removing stale input from lock file");
    lock_file.inputs.remove(name);
  }

  let changed = !result_updated.is_empty() || !added.is_empty() || !stale.is_empty();

  Ok(LockResult {
    lock_file,
    changed,
    updated: result_updated,
    added,
    removed: stale,
  })
}

/// Compute a content pin for a locator.
///
/// `path:` locators are hashed in place; anything else is fetched through the
/// repository and the returned bytes are hashed.
pub fn compute_pin(
  name: &str,
  url: &str,
  repo: &dyn PackageRepository,
  config_dir: &Path,
) -> Result<String, LockError> {
  let hash = if let Some(path_str) = url.strip_prefix("path:") {
    let path = resolve_path(path_str, config_dir).map_err(|source| LockError::Fetch {
      name: name.to_string(),
      source,
    })?;

    let hashed = if path.is_dir() {
      hash_directory(&path, PATH_HASH_EXCLUDES)
    } else {
      hash_file(&path)
    };

    hashed.map_err(|source| LockError::Hash {
      name: name.to_string(),
      source,
    })?
  } else {
    let bytes = repo.fetch(url).map_err(|source| LockError::Fetch {
      name: name.to_string(),
      source,
    })?;
    hash_bytes(&bytes)
  };

  debug!(name, url, pin = %hash, "computed pin");
  Ok(hash.to_pin())
}

/// Write `pinenv.lock` next to the config if [`lock_inputs`] changed anything.
pub fn save_lock_file_if_changed(result: &LockResult, config_dir: &Path) -> Result<(), LockError> {
  if result.changed {
    let lock_path = config_dir.join(LOCK_FILENAME);
    info!(path = %lock_path.display(), "writing lock file");
    result.lock_file.save(&lock_path)?;
  }
  Ok(())
}

fn unix_now() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs())
    .unwrap_or(0)
}
