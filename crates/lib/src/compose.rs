//! Environment composition.
//!
//! Turns a resolved package set into the descriptor a launcher consumes: the
//! selected packages in selection order plus the merged variable bindings.
//!
//! Variable precedence, lowest to highest:
//! 1. package contributions, in selection order (later packages overwrite)
//! 2. explicit extra variables

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::pkgs::{PackageDescriptor, PackageSet};
use crate::placeholder::{self, PlaceholderError};
use crate::platform::Platform;
use crate::util::hash::HashError;

#[derive(Debug, Error)]
pub enum ComposeError {
  /// Selected packages that the resolved set does not contain, in selection order.
  #[error("package(s) not available on {platform}: {}", .names.join(", "))]
  MissingPackage { platform: Platform, names: Vec<String> },

  /// Names must match `[A-Za-z_][A-Za-z0-9_]*` to be exported by any shell.
  #[error("invalid variable name '{variable}'{}", contributed_by(.package))]
  InvalidVariableName { variable: String, package: Option<String> },

  #[error("variable '{variable}'{}: {source}", contributed_by(.package))]
  Placeholder {
    variable: String,
    package: Option<String>,
    #[source]
    source: PlaceholderError,
  },

  #[error("failed to compute store path of '{package}': {source}")]
  Hash {
    package: String,
    #[source]
    source: HashError,
  },
}

fn contributed_by(package: &Option<String>) -> String {
  match package {
    Some(p) => format!(" of package '{p}'"),
    None => String::new(),
  }
}

/// Whether `name` is a portable environment variable name.
pub fn is_valid_variable_name(name: &str) -> bool {
  let mut chars = name.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_variable_name(variable: &str, package: Option<&str>) -> Result<(), ComposeError> {
  if is_valid_variable_name(variable) {
    return Ok(());
  }
  Err(ComposeError::InvalidVariableName {
    variable: variable.to_string(),
    package: package.map(str::to_string),
  })
}

/// A launch-ready environment for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentDescriptor {
  pub platform: Platform,
  /// Selected packages, in selection order.
  pub packages: Vec<PackageDescriptor>,
  pub variables: BTreeMap<String, String>,
  /// Store location of each selected package.
  pub store_paths: BTreeMap<String, PathBuf>,
}

impl EnvironmentDescriptor {
  pub fn store_path(&self, package: &str) -> Option<&Path> {
    self.store_paths.get(package).map(PathBuf::as_path)
  }

  /// `<store path>/bin` of every selected package, in selection order.
  pub fn bin_dirs(&self) -> Vec<PathBuf> {
    self
      .packages
      .iter()
      .filter_map(|p| self.store_path(&p.name))
      .map(|path| path.join("bin"))
      .collect()
  }
}

/// Resolves `$${out}` and `$${pkg:NAME}` against precomputed store paths.
struct StorePaths<'a> {
  paths: &'a BTreeMap<&'a str, String>,
  out: Option<&'a str>,
}

impl placeholder::Resolver for StorePaths<'_> {
  fn resolve_out(&self) -> Result<&str, PlaceholderError> {
    self
      .out
      .ok_or_else(|| PlaceholderError::Malformed("$${out} is only valid in package variables".to_string()))
  }

  fn resolve_package(&self, name: &str) -> Result<&str, PlaceholderError> {
    self
      .paths
      .get(name)
      .map(String::as_str)
      .ok_or_else(|| PlaceholderError::UnresolvedPackage(name.to_string()))
  }
}

/// Builds [`EnvironmentDescriptor`]s from resolved package sets.
#[derive(Debug, Clone)]
pub struct EnvironmentComposer {
  store_dir: PathBuf,
}

impl EnvironmentComposer {
  pub fn new(store_dir: impl Into<PathBuf>) -> Self {
    Self {
      store_dir: store_dir.into(),
    }
  }

  pub fn store_dir(&self) -> &Path {
    &self.store_dir
  }

  /// Compose the environment for `selected` out of `set`.
  ///
  /// A name selected twice keeps its first position.
  pub fn compose(
    &self,
    platform: Platform,
    set: &PackageSet,
    selected: &[String],
    extra: &BTreeMap<String, String>,
  ) -> Result<EnvironmentDescriptor, ComposeError> {
    let missing: Vec<String> = selected.iter().filter(|name| !set.contains_key(*name)).cloned().collect();
    if !missing.is_empty() {
      return Err(ComposeError::MissingPackage {
        platform,
        names: missing,
      });
    }

    let mut order: Vec<&PackageDescriptor> = Vec::with_capacity(selected.len());
    for name in selected {
      if let Some(desc) = set.get(name)
        && !order.iter().any(|d| d.name == desc.name)
      {
        order.push(desc);
      }
    }

    let mut paths: BTreeMap<&str, String> = BTreeMap::new();
    let mut store_paths = BTreeMap::new();
    for (name, desc) in set {
      let path = desc.store_path(&self.store_dir).map_err(|source| ComposeError::Hash {
        package: name.clone(),
        source,
      })?;
      paths.insert(name.as_str(), path.display().to_string());
      if order.iter().any(|d| d.name == *name) {
        store_paths.insert(name.clone(), path);
      }
    }

    let mut variables = BTreeMap::new();
    for desc in &order {
      let resolver = StorePaths {
        paths: &paths,
        out: paths.get(desc.name.as_str()).map(String::as_str),
      };

      for (key, value) in &desc.env {
        check_variable_name(key, Some(&desc.name))?;
        let value = placeholder::substitute(value, &resolver).map_err(|source| ComposeError::Placeholder {
          variable: key.clone(),
          package: Some(desc.name.clone()),
          source,
        })?;
        if let Some(previous) = variables.insert(key.clone(), value) {
          trace!(variable = %key, package = %desc.name, %previous, "variable overwritten");
        }
      }
    }

    let resolver = StorePaths { paths: &paths, out: None };
    for (key, value) in extra {
      check_variable_name(key, None)?;
      let value = placeholder::substitute(value, &resolver).map_err(|source| ComposeError::Placeholder {
        variable: key.clone(),
        package: None,
        source,
      })?;
      variables.insert(key.clone(), value);
    }

    debug!(%platform, packages = order.len(), variables = variables.len(), "composed environment");

    Ok(EnvironmentDescriptor {
      platform,
      packages: order.into_iter().cloned().collect(),
      variables,
      store_paths,
    })
  }
}
