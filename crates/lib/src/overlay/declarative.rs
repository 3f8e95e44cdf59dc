//! Overlays written as data.
//!
//! ```json
//! {
//!   "name": "rust",
//!   "order": 10,
//!   "platforms": ["x86_64-linux", "aarch64-darwin"],
//!   "packages": {
//!     "rustToolchain": {
//!       "version": "1.88.0",
//!       "env": { "RUST_SRC_PATH": "$${out}/lib/rustlib/src/rust/library" }
//!     },
//!     "cargo": { "extends": "cargo", "buildInputs": ["rustToolchain"] },
//!     "rust": { "alias": "rustToolchain" }
//!   }
//! }
//! ```
//!
//! A definition either stands alone (it needs a `version`) or `extends` a
//! package from the accumulator and overrides only the fields it sets. An
//! alias copies a package from the final set under a new name.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Overlay, OverlayContext, OverlayError};
use crate::pkgs::{PackageDescriptor, PackageSet};
use crate::platform::Platform;

/// An overlay as written in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayDecl {
  pub name: String,

  #[serde(default)]
  pub order: i64,

  /// Restrict the overlay to these platforms. Applies everywhere if absent.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub platforms: Option<Vec<Platform>>,

  #[serde(default)]
  pub packages: BTreeMap<String, PackageDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PackageDecl {
  Alias(AliasDecl),
  Define(PackageDef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasDecl {
  pub alias: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PackageDef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub extends: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pin: Option<String>,
  /// Replaces the extended package's build inputs when set.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build_inputs: Option<BTreeSet<String>>,
  /// Merged over the extended package's variables.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, String>,
}

/// A validated [`OverlayDecl`].
#[derive(Debug, Clone)]
pub struct DeclarativeOverlay {
  decl: OverlayDecl,
}

impl TryFrom<OverlayDecl> for DeclarativeOverlay {
  type Error = OverlayError;

  fn try_from(decl: OverlayDecl) -> Result<Self, Self::Error> {
    for (package, pkg) in &decl.packages {
      if let PackageDecl::Define(def) = pkg
        && def.extends.is_none()
        && def.version.is_none()
      {
        return Err(OverlayError::MissingVersion {
          overlay: decl.name.clone(),
          package: package.clone(),
        });
      }
    }
    Ok(Self { decl })
  }
}

impl DeclarativeOverlay {
  pub fn decl(&self) -> &OverlayDecl {
    &self.decl
  }

  fn applies_to(&self, platform: Platform) -> bool {
    self
      .decl
      .platforms
      .as_ref()
      .is_none_or(|platforms| platforms.contains(&platform))
  }

  fn define(
    &self,
    ctx: &OverlayContext,
    name: &str,
    def: &PackageDef,
    prev: &PackageSet,
  ) -> Result<PackageDescriptor, OverlayError> {
    let mut desc = match &def.extends {
      Some(target) => prev.get(target).cloned().ok_or_else(|| OverlayError::MissingBase {
        overlay: self.decl.name.clone(),
        package: name.to_string(),
        target: target.clone(),
      })?,
      None => PackageDescriptor::new(name, "", ctx.platform),
    };

    desc.name = name.to_string();
    desc.platform = ctx.platform;
    if let Some(version) = &def.version {
      desc.version = version.clone();
    }
    if def.pin.is_some() {
      desc.pin = def.pin.clone();
    }
    if let Some(build_inputs) = &def.build_inputs {
      desc.build_inputs = build_inputs.clone();
    }
    desc.env.extend(def.env.iter().map(|(k, v)| (k.clone(), v.clone())));

    Ok(desc)
  }
}

impl Overlay for DeclarativeOverlay {
  fn name(&self) -> &str {
    &self.decl.name
  }

  fn order(&self) -> i64 {
    self.decl.order
  }

  fn apply(&self, ctx: &OverlayContext, prev: &PackageSet, final_set: &PackageSet) -> Result<PackageSet, OverlayError> {
    let mut delta = PackageSet::new();

    if !self.applies_to(ctx.platform) {
      return Ok(delta);
    }

    for (name, pkg) in &self.decl.packages {
      match pkg {
        PackageDecl::Define(def) => {
          delta.insert(name.clone(), self.define(ctx, name, def, prev)?);
        }
        PackageDecl::Alias(AliasDecl { alias }) => match final_set.get(alias) {
          Some(target) => {
            let mut desc = target.clone();
            desc.name = name.clone();
            delta.insert(name.clone(), desc);
          }
          None => debug!(
            overlay = %self.decl.name,
            package = %name,
            target = %alias,
            pass = ctx.pass,
            "alias target not in final set yet"
          ),
        },
      }
    }

    Ok(delta)
  }
}
