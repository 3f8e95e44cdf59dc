//! Package descriptors and package sets.
//!
//! A [`PackageSet`] maps package names to the concrete [`PackageDescriptor`]
//! resolved for one platform. Sets are ordered maps so that iteration, and
//! therefore everything derived from a set, is deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::util::hash::{HashError, Hashable};

/// Mapping from package name to descriptor.
pub type PackageSet = BTreeMap<String, PackageDescriptor>;

/// The resolved record for one package on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
  pub name: String,
  pub version: String,
  pub platform: Platform,

  /// Immutable identity of this package (content hash or exact tag).
  /// Two descriptors with different pins are incompatible.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pin: Option<String>,

  /// Names of packages in the same set this package depends on.
  #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
  pub build_inputs: BTreeSet<String>,

  /// Environment variables this package contributes when selected.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,
}

impl Hashable for PackageDescriptor {}

impl PackageDescriptor {
  pub fn new(name: impl Into<String>, version: impl Into<String>, platform: Platform) -> Self {
    Self {
      name: name.into(),
      version: version.into(),
      platform,
      pin: None,
      build_inputs: BTreeSet::new(),
      env: BTreeMap::new(),
    }
  }

  pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
    self.pin = Some(pin.into());
    self
  }

  pub fn with_build_input(mut self, name: impl Into<String>) -> Self {
    self.build_inputs.insert(name.into());
    self
  }

  pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  /// Whether `other` may replace this descriptor without a conflict.
  ///
  /// Descriptors are compatible unless both carry a pin and the pins differ.
  pub fn is_compatible_with(&self, other: &PackageDescriptor) -> bool {
    match (&self.pin, &other.pin) {
      (Some(a), Some(b)) => a == b,
      _ => true,
    }
  }

  /// `name@version`, as shown to users.
  pub fn label(&self) -> String {
    format!("{}@{}", self.name, self.version)
  }

  /// Store location: `<store>/<hash>-<name>-<version>`.
  pub fn store_path(&self, store: &Path) -> Result<PathBuf, HashError> {
    let hash = self.compute_hash()?;
    Ok(store.join(format!("{}-{}-{}", hash, self.name, self.version)))
  }
}
