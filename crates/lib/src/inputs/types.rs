//! Input types for declaration and resolution.
//!
//! - [`InputDecl`] - an input as written in the configuration
//! - [`Input`] - a registered input (name, locator, optional pin)
//! - [`ResolvedInput`] - a concrete locator and pin, reached after following aliases

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Where an input comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Locator {
  /// A concrete source URL such as `github:nixos/nixpkgs/nixos-24.05` or `path:./vendor/pkgs`.
  Url(String),

  /// Use whatever another input resolves to.
  Follows(String),
}

impl Locator {
  /// The follows target, if this is an alias.
  pub fn follows(&self) -> Option<&str> {
    match self {
      Locator::Follows(target) => Some(target),
      Locator::Url(_) => None,
    }
  }

  /// Check if this is an alias.
  pub fn is_alias(&self) -> bool {
    matches!(self, Locator::Follows(_))
  }
}

/// Scheme of a concrete locator URL: the part before the first `:`, or `"url"` if none.
pub fn locator_scheme(url: &str) -> &str {
  match url.split_once(':') {
    Some((scheme, _)) if !scheme.is_empty() => scheme,
    _ => "url",
  }
}

/// A registered input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
  pub name: String,
  pub locator: Locator,
  /// Content hash or exact version tag. Aliases never carry one.
  pub pin: Option<String>,
}

/// A parsed input declaration from the configuration.
///
/// ```json
/// "inputs": {
///   "nixpkgs": { "url": "github:nixos/nixpkgs/nixos-24.05", "pin": "hash123" },
///   "local": "path:./vendor/pkgs",
///   "pkgs": { "follows": "nixpkgs" }
/// }
/// ```
///
/// A declaration mixing `url` and `follows` matches no form and is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, deny_unknown_fields)]
pub enum InputDecl {
  /// Bare URL, pinned through the lock file.
  Url(String),

  /// URL with an optional explicit pin.
  Pinned {
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pin: Option<String>,
  },

  /// Alias to another input.
  Follows { follows: String },
}

impl InputDecl {
  /// Get the URL from the declaration, if concrete.
  pub fn url(&self) -> Option<&str> {
    match self {
      InputDecl::Url(url) | InputDecl::Pinned { url, .. } => Some(url),
      InputDecl::Follows { .. } => None,
    }
  }

  /// The pin written in the configuration, if any.
  pub fn pin(&self) -> Option<&str> {
    match self {
      InputDecl::Pinned { pin, .. } => pin.as_deref(),
      _ => None,
    }
  }

  pub fn locator(&self) -> Locator {
    match self {
      InputDecl::Url(url) | InputDecl::Pinned { url, .. } => Locator::Url(url.clone()),
      InputDecl::Follows { follows } => Locator::Follows(follows.clone()),
    }
  }
}

/// Map of input names to their declarations.
pub type InputDecls = BTreeMap<String, InputDecl>;

/// A fully resolved input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInput {
  /// The concrete URL at the end of the alias chain.
  pub url: String,

  /// The pin of the concrete input.
  pub pin: String,

  /// Names visited from the requested input to the concrete one, inclusive.
  /// A non-alias input has a chain of length one.
  pub chain: Vec<String>,
}

impl ResolvedInput {
  /// Name of the concrete input this resolved to.
  pub fn source(&self) -> &str {
    self.chain.last().map(String::as_str).unwrap_or_default()
  }

  /// Check if the requested input was an alias.
  pub fn is_aliased(&self) -> bool {
    self.chain.len() > 1
  }
}

/// Map of input names to their resolved state. This is what the package
/// repository receives as "pinned inputs".
pub type PinnedInputs = BTreeMap<String, ResolvedInput>;
