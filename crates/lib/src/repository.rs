//! The package repository collaborator.
//!
//! The resolver never builds or downloads packages itself. It asks a
//! [`PackageRepository`] for the base package set of a platform, keyed by the
//! pinned inputs, and routes any locator fetch through the same interface.
//!
//! [`SnapshotRepository`] is the implementation used by the CLI: a set of
//! pre-resolved package sets, keyed by the pin of one designated input and by
//! platform, loaded from a JSON file.
//!
//! # Snapshot Format
//!
//! ```json
//! {
//!   "snapshots": {
//!     "hash123": {
//!       "x86_64-linux": {
//!         "ripgrep": { "version": "14.1.0", "pin": "sha256:..." },
//!         "cargo": { "version": "1.88.0", "buildInputs": ["rustc"] }
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::inputs::PinnedInputs;
use crate::pkgs::{PackageDescriptor, PackageSet};
use crate::platform::Platform;
use crate::platform::paths::home_dir;

/// Errors raised at the repository boundary.
///
/// The resolver propagates these without interpreting them.
#[derive(Debug, Error)]
pub enum FetchError {
  /// The path does not exist.
  #[error("path does not exist: {0}")]
  PathNotFound(PathBuf),

  #[error("failed to resolve path '{path}': {source}")]
  CanonicalizePath {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// This repository cannot fetch the locator's scheme.
  #[error("unsupported locator '{0}'")]
  UnsupportedLocator(String),

  /// The input the repository is keyed by was not among the pinned inputs.
  #[error("repository input '{0}' is not pinned")]
  MissingInput(String),

  /// No package set is known for this pin.
  #[error("no package set for {input} at pin '{pin}'")]
  UnknownPin { input: String, pin: String },

  /// The pin is known but has no package set for this platform.
  #[error("no package set for {input} on {platform}")]
  Unavailable { input: String, platform: Platform },

  /// Any other failure from a custom repository.
  #[error(transparent)]
  Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Supplies base package sets and raw bytes for locators.
///
/// Implementations must be deterministic: the same platform and pins always
/// produce the same set.
pub trait PackageRepository: Send + Sync {
  /// The platform-specific base package set for the given pins.
  fn base_package_set(&self, platform: Platform, pinned: &PinnedInputs) -> Result<PackageSet, FetchError>;

  /// Fetch the bytes behind a locator.
  fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError>;
}

/// A package as stored in a snapshot. Name and platform come from its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPackage {
  pub version: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pin: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
  pub build_inputs: BTreeSet<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,
}

impl SnapshotPackage {
  fn to_descriptor(&self, name: &str, platform: Platform) -> PackageDescriptor {
    PackageDescriptor {
      name: name.to_string(),
      version: self.version.clone(),
      platform,
      pin: self.pin.clone(),
      build_inputs: self.build_inputs.clone(),
      env: self.env.clone(),
    }
  }
}

impl From<&PackageDescriptor> for SnapshotPackage {
  fn from(desc: &PackageDescriptor) -> Self {
    Self {
      version: desc.version.clone(),
      pin: desc.pin.clone(),
      build_inputs: desc.build_inputs.clone(),
      env: desc.env.clone(),
    }
  }
}

type PlatformSets = BTreeMap<Platform, BTreeMap<String, SnapshotPackage>>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotFile {
  #[serde(default)]
  snapshots: BTreeMap<String, PlatformSets>,
}

/// Package sets keyed by the pin of one input and by platform.
#[derive(Debug, Clone)]
pub struct SnapshotRepository {
  input: String,
  root: PathBuf,
  snapshots: BTreeMap<String, PlatformSets>,
}

impl SnapshotRepository {
  /// An empty repository keyed by `input`.
  ///
  /// `root` is the directory relative `path:` and `file:` locators are read from.
  pub fn new(input: &str, root: &Path) -> Self {
    Self {
      input: input.to_string(),
      root: root.to_path_buf(),
      snapshots: BTreeMap::new(),
    }
  }

  /// Load snapshots from a JSON file. Relative locators resolve against `root`.
  pub fn load(input: &str, path: &Path, root: &Path) -> Result<Self, FetchError> {
    let content = fs::read_to_string(path).map_err(|source| {
      if source.kind() == io::ErrorKind::NotFound {
        FetchError::PathNotFound(path.to_path_buf())
      } else {
        FetchError::Read {
          path: path.to_path_buf(),
          source,
        }
      }
    })?;

    let file: SnapshotFile = serde_json::from_str(&content).map_err(|source| FetchError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    debug!(path = %path.display(), pins = file.snapshots.len(), "loaded package snapshots");

    Ok(Self {
      input: input.to_string(),
      root: root.to_path_buf(),
      snapshots: file.snapshots,
    })
  }

  /// Name of the input whose pin selects the snapshot.
  pub fn input(&self) -> &str {
    &self.input
  }

  /// Add or replace the package set for a pin and platform.
  pub fn insert(&mut self, pin: &str, platform: Platform, set: &PackageSet) {
    let packages = set
      .iter()
      .map(|(name, desc)| (name.clone(), SnapshotPackage::from(desc)))
      .collect();
    self
      .snapshots
      .entry(pin.to_string())
      .or_default()
      .insert(platform, packages);
  }

  pub fn with_set(mut self, pin: &str, platform: Platform, set: &PackageSet) -> Self {
    self.insert(pin, platform, set);
    self
  }
}

impl PackageRepository for SnapshotRepository {
  fn base_package_set(&self, platform: Platform, pinned: &PinnedInputs) -> Result<PackageSet, FetchError> {
    let resolved = pinned
      .get(&self.input)
      .ok_or_else(|| FetchError::MissingInput(self.input.clone()))?;

    let per_platform = self.snapshots.get(&resolved.pin).ok_or_else(|| FetchError::UnknownPin {
      input: self.input.clone(),
      pin: resolved.pin.clone(),
    })?;

    let packages = per_platform.get(&platform).ok_or_else(|| FetchError::Unavailable {
      input: self.input.clone(),
      platform,
    })?;

    debug!(%platform, pin = %resolved.pin, packages = packages.len(), "loaded base package set");

    Ok(
      packages
        .iter()
        .map(|(name, pkg)| (name.clone(), pkg.to_descriptor(name, platform)))
        .collect(),
    )
  }

  fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
    let path_str = locator
      .strip_prefix("path:")
      .or_else(|| locator.strip_prefix("file:"))
      .ok_or_else(|| FetchError::UnsupportedLocator(locator.to_string()))?;

    let path = resolve_path(path_str, &self.root)?;
    fs::read(&path).map_err(|source| FetchError::Read { path, source })
  }
}

/// Resolve a path locator to an absolute, existing path.
///
/// Handles `~` expansion; relative paths resolve against `base_dir`.
pub fn resolve_path(path_str: &str, base_dir: &Path) -> Result<PathBuf, FetchError> {
  let expanded = if let Some(rest) = path_str.strip_prefix("~/") {
    home_dir().join(rest)
  } else if path_str == "~" {
    home_dir()
  } else if Path::new(path_str).is_absolute() {
    PathBuf::from(path_str)
  } else {
    base_dir.join(path_str)
  };

  let canonical = dunce::canonicalize(&expanded).map_err(|e| {
    if e.kind() == io::ErrorKind::NotFound {
      FetchError::PathNotFound(expanded.clone())
    } else {
      FetchError::CanonicalizePath {
        path: expanded,
        source: e,
      }
    }
  })?;

  debug!(path = %canonical.display(), "resolved path locator");
  Ok(canonical)
}
