//! Package set resolution for one platform.
//!
//! base set (from the repository) -> overlay fold -> validation.
//!
//! Validation rejects sets that are internally inconsistent: a descriptor
//! stored under another name, a descriptor for another platform, a build
//! input that is not in the set, or a dependency cycle.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info_span};

use crate::inputs::PinnedInputs;
use crate::overlay::{OverlayError, OverlayStack};
use crate::pkgs::PackageSet;
use crate::platform::Platform;
use crate::repository::{FetchError, PackageRepository};

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error(transparent)]
  Overlay(#[from] OverlayError),

  /// A build input names a package that is not in the set.
  #[error("package '{package}' depends on '{missing}', which is not in the package set")]
  DanglingDependency { package: String, missing: String },

  /// Build inputs form a cycle. Members are sorted.
  #[error("dependency cycle between {}", .members.join(", "))]
  DependencyCycle { members: Vec<String> },

  #[error("package set entry '{key}' holds a descriptor named '{name}'")]
  NameMismatch { key: String, name: String },

  #[error("package '{name}' was resolved for {found}, expected {expected}")]
  PlatformMismatch {
    name: String,
    expected: Platform,
    found: Platform,
  },
}

/// Produces the final package set for a platform.
pub struct PackageSetResolver<'a> {
  repo: &'a dyn PackageRepository,
  overlays: &'a OverlayStack,
}

impl<'a> PackageSetResolver<'a> {
  pub fn new(repo: &'a dyn PackageRepository, overlays: &'a OverlayStack) -> Self {
    Self { repo, overlays }
  }

  pub fn resolve(&self, platform: Platform, pinned: &PinnedInputs) -> Result<PackageSet, ResolveError> {
    let _span = info_span!("resolve", %platform).entered();

    let base = self.repo.base_package_set(platform, pinned)?;
    debug!(packages = base.len(), "base package set");

    let set = self.overlays.apply(&base, platform)?;
    validate(&set, platform)?;

    debug!(packages = set.len(), "package set resolved");
    Ok(set)
  }
}

/// Check a package set for consistency.
pub fn validate(set: &PackageSet, platform: Platform) -> Result<(), ResolveError> {
  for (key, desc) in set {
    if *key != desc.name {
      return Err(ResolveError::NameMismatch {
        key: key.clone(),
        name: desc.name.clone(),
      });
    }
    if desc.platform != platform {
      return Err(ResolveError::PlatformMismatch {
        name: desc.name.clone(),
        expected: platform,
        found: desc.platform,
      });
    }
    if let Some(missing) = desc.build_inputs.iter().find(|dep| !set.contains_key(*dep)) {
      return Err(ResolveError::DanglingDependency {
        package: key.clone(),
        missing: missing.clone(),
      });
    }
  }

  if let Some(members) = find_cycle(set) {
    return Err(ResolveError::DependencyCycle { members });
  }

  Ok(())
}

/// Sorted members of the first dependency cycle, if any.
///
/// Cycles are ordered by their smallest member so the result does not depend
/// on graph traversal order.
fn find_cycle(set: &PackageSet) -> Option<Vec<String>> {
  let mut graph: DiGraph<&str, ()> = DiGraph::new();
  let nodes: HashMap<&str, NodeIndex> = set
    .keys()
    .map(|name| (name.as_str(), graph.add_node(name.as_str())))
    .collect();

  for (name, desc) in set {
    for dep in &desc.build_inputs {
      if let Some(&dep_idx) = nodes.get(dep.as_str()) {
        graph.add_edge(nodes[name.as_str()], dep_idx, ());
      }
    }
  }

  tarjan_scc(&graph)
    .into_iter()
    .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
    .map(|scc| {
      let mut members: Vec<String> = scc.iter().map(|idx| graph[*idx].to_string()).collect();
      members.sort();
      members
    })
    .min()
}
