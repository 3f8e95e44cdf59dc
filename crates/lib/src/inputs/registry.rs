//! The input registry.
//!
//! Inputs are registered once while loading a configuration and are read-only
//! afterwards. Resolution follows `follows` aliases until a concrete locator is
//! reached. Every input visited on the way caches its result, so a second
//! `resolve` of any of them is a single lookup.

use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use thiserror::Error;
use tracing::{debug, trace};

use super::lock::LockFile;
use super::types::{Input, InputDecls, Locator, PinnedInputs, ResolvedInput};

/// Errors raised while registering or resolving inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
  /// An input with this name was already registered.
  #[error("input '{0}' is already registered")]
  Duplicate(String),

  /// A name was looked up (directly or as an alias target) but never registered.
  #[error("unknown input '{name}'{}", followed_from(.referenced_by))]
  Unknown {
    name: String,
    referenced_by: Option<String>,
  },

  /// Following aliases revisited a name.
  #[error("cyclic alias: {}", .chain.join(" -> "))]
  CyclicAlias { chain: Vec<String> },

  /// A concrete input has no pin, neither in the configuration nor in the lock file.
  #[error("input '{0}' is not pinned; set a pin or run 'pinenv lock'")]
  Unpinned(String),

  /// Aliases take their pin from their target.
  #[error("alias input '{0}' cannot carry its own pin")]
  AliasPinned(String),
}

fn followed_from(referenced_by: &Option<String>) -> String {
  match referenced_by {
    Some(r) => format!(" (followed from '{r}')"),
    None => String::new(),
  }
}

#[derive(Debug)]
struct Entry {
  input: Input,
  resolved: OnceLock<ResolvedInput>,
}

/// Named inputs and their pins.
#[derive(Debug, Default)]
pub struct InputRegistry {
  entries: BTreeMap<String, Entry>,
}

impl InputRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a registry from configuration declarations.
  ///
  /// Concrete inputs without a pin in the configuration take the pin from a
  /// lock entry with the same URL, if any.
  pub fn from_decls(decls: &InputDecls, lock: Option<&LockFile>) -> Result<Self, InputError> {
    let mut registry = Self::new();

    for (name, decl) in decls {
      let pin = match decl.pin() {
        Some(pin) => Some(pin.to_string()),
        None => decl.url().and_then(|url| {
          lock
            .and_then(|l| l.get(name))
            .filter(|locked| locked.url == url)
            .map(|locked| locked.pin.clone())
        }),
      };

      registry.register(name, decl.locator(), pin)?;
    }

    Ok(registry)
  }

  /// Register an input.
  pub fn register(&mut self, name: &str, locator: Locator, pin: Option<String>) -> Result<(), InputError> {
    if self.entries.contains_key(name) {
      return Err(InputError::Duplicate(name.to_string()));
    }
    if locator.is_alias() && pin.is_some() {
      return Err(InputError::AliasPinned(name.to_string()));
    }

    trace!(name, ?locator, "registering input");
    self.entries.insert(
      name.to_string(),
      Entry {
        input: Input {
          name: name.to_string(),
          locator,
          pin,
        },
        resolved: OnceLock::new(),
      },
    );
    Ok(())
  }

  /// Get a registered input by name.
  pub fn get(&self, name: &str) -> Option<&Input> {
    self.entries.get(name).map(|e| &e.input)
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.entries.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Resolve an input to its concrete locator and pin.
  pub fn resolve(&self, name: &str) -> Result<&ResolvedInput, InputError> {
    let entry = self.entries.get(name).ok_or_else(|| InputError::Unknown {
      name: name.to_string(),
      referenced_by: None,
    })?;

    if let Some(resolved) = entry.resolved.get() {
      return Ok(resolved);
    }

    let mut chain = vec![name.to_string()];
    let mut visited: HashSet<&str> = HashSet::from([name]);
    let mut current = entry;

    // Walk until a concrete input or an already-cached one.
    let (url, pin, tail) = loop {
      if let Some(cached) = current.resolved.get() {
        break (cached.url.clone(), cached.pin.clone(), &cached.chain[1..]);
      }

      match &current.input.locator {
        Locator::Url(url) => {
          let pin = current
            .input
            .pin
            .clone()
            .ok_or_else(|| InputError::Unpinned(current.input.name.clone()))?;
          break (url.clone(), pin, &[][..]);
        }
        Locator::Follows(target) => {
          if !visited.insert(target.as_str()) {
            chain.push(target.clone());
            return Err(InputError::CyclicAlias { chain });
          }

          current = self.entries.get(target).ok_or_else(|| InputError::Unknown {
            name: target.clone(),
            referenced_by: Some(current.input.name.clone()),
          })?;
          chain.push(target.clone());
        }
      }
    };

    chain.extend(tail.iter().cloned());

    debug!(name, chain = %chain.join(" -> "), pin = %pin, "resolved input");

    for (i, hop) in chain.iter().enumerate() {
      if let Some(hop_entry) = self.entries.get(hop) {
        let _ = hop_entry.resolved.set(ResolvedInput {
          url: url.clone(),
          pin: pin.clone(),
          chain: chain[i..].to_vec(),
        });
      }
    }

    entry
      .resolved
      .get()
      .ok_or_else(|| InputError::Unpinned(name.to_string()))
  }

  /// Resolve every registered input.
  pub fn resolve_all(&self) -> Result<PinnedInputs, InputError> {
    self
      .entries
      .keys()
      .map(|name| self.resolve(name).map(|r| (name.clone(), r.clone())))
      .collect()
  }
}
