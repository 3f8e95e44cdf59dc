//! The overlay stack.
//!
//! An overlay is a pure transformation `(prev, final) -> delta`:
//!
//! - `prev` is the accumulator: the base set plus every earlier overlay's delta
//!   from the current pass.
//! - `final` is the complete set produced by the previous pass (the base set on
//!   the first pass).
//!
//! Overlays are folded in registration order. The fold is repeated, feeding
//! each result back in as `final`, until two passes agree. An overlay can
//! therefore refer to packages defined by a later overlay without ever seeing
//! partial state from the pass it is running in.
//!
//! Two overlays with the same order index that define the same package with
//! different pins conflict. Otherwise the last-applied definition wins, and an
//! unpinned redefinition inherits the pin already claimed in its group.

pub mod declarative;

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, trace};

use crate::consts::MAX_OVERLAY_PASSES;
use crate::pkgs::{PackageDescriptor, PackageSet};
use crate::platform::Platform;

pub use declarative::{AliasDecl, DeclarativeOverlay, OverlayDecl, PackageDecl, PackageDef};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
  /// Two overlays at the same order index disagree on a package's pin.
  #[error(
    "overlays '{first}' and '{second}' (order {order}) define '{package}' with incompatible pins {} and {}",
    display_pin(.first_pin),
    display_pin(.second_pin)
  )]
  Conflict {
    package: String,
    order: i64,
    first: String,
    first_pin: Option<String>,
    second: String,
    second_pin: Option<String>,
  },

  /// `extends` named a package that is not in the accumulator.
  #[error("overlay '{overlay}': package '{package}' extends unknown package '{target}'")]
  MissingBase {
    overlay: String,
    package: String,
    target: String,
  },

  /// A declarative definition is neither complete nor an extension.
  #[error("overlay '{overlay}': package '{package}' needs a version or 'extends'")]
  MissingVersion { overlay: String, package: String },

  /// The fold did not reach a fixpoint.
  #[error("overlays did not converge after {passes} passes")]
  Diverged { passes: usize },
}

fn display_pin(pin: &Option<String>) -> String {
  match pin {
    Some(pin) => format!("'{pin}'"),
    None => "(none)".to_string(),
  }
}

/// What an overlay knows about the run it is part of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayContext {
  pub platform: Platform,
  /// 1-based fold pass.
  pub pass: usize,
}

/// A package set transformation.
pub trait Overlay: Send + Sync {
  fn name(&self) -> &str;

  /// Conflict group. Does not affect application order.
  fn order(&self) -> i64;

  /// Compute this overlay's additions and replacements.
  ///
  /// Must be deterministic in its arguments.
  fn apply(&self, ctx: &OverlayContext, prev: &PackageSet, final_set: &PackageSet) -> Result<PackageSet, OverlayError>;
}

/// An overlay backed by a closure.
pub struct FnOverlay<F> {
  name: String,
  order: i64,
  f: F,
}

impl<F> FnOverlay<F>
where
  F: Fn(&OverlayContext, &PackageSet, &PackageSet) -> PackageSet + Send + Sync,
{
  pub fn new(name: &str, order: i64, f: F) -> Self {
    Self {
      name: name.to_string(),
      order,
      f,
    }
  }
}

impl<F> Overlay for FnOverlay<F>
where
  F: Fn(&OverlayContext, &PackageSet, &PackageSet) -> PackageSet + Send + Sync,
{
  fn name(&self) -> &str {
    &self.name
  }

  fn order(&self) -> i64 {
    self.order
  }

  fn apply(&self, ctx: &OverlayContext, prev: &PackageSet, final_set: &PackageSet) -> Result<PackageSet, OverlayError> {
    Ok((self.f)(ctx, prev, final_set))
  }
}

impl<F> fmt::Debug for FnOverlay<F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FnOverlay")
      .field("name", &self.name)
      .field("order", &self.order)
      .finish_non_exhaustive()
  }
}

/// Overlays in application order.
#[derive(Default)]
pub struct OverlayStack {
  overlays: Vec<Box<dyn Overlay>>,
}

impl fmt::Debug for OverlayStack {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list()
      .entries(self.overlays.iter().map(|o| (o.name(), o.order())))
      .finish()
  }
}

impl OverlayStack {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append an overlay. It runs after every overlay pushed before it.
  pub fn push(&mut self, overlay: impl Overlay + 'static) {
    self.overlays.push(Box::new(overlay));
  }

  pub fn with(mut self, overlay: impl Overlay + 'static) -> Self {
    self.push(overlay);
    self
  }

  pub fn len(&self) -> usize {
    self.overlays.len()
  }

  pub fn is_empty(&self) -> bool {
    self.overlays.is_empty()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.overlays.iter().map(|o| o.name())
  }

  /// Fold the stack over `base` until the result stops changing.
  pub fn apply(&self, base: &PackageSet, platform: Platform) -> Result<PackageSet, OverlayError> {
    if self.overlays.is_empty() {
      return Ok(base.clone());
    }

    let mut final_set = base.clone();

    for pass in 1..=MAX_OVERLAY_PASSES {
      let ctx = OverlayContext { platform, pass };
      let next = self.fold(&ctx, base, &final_set)?;

      if next == final_set {
        debug!(%platform, passes = pass, packages = next.len(), "overlays converged");
        return Ok(next);
      }
      final_set = next;
    }

    Err(OverlayError::Diverged {
      passes: MAX_OVERLAY_PASSES,
    })
  }

  /// One left-to-right pass.
  fn fold(&self, ctx: &OverlayContext, base: &PackageSet, final_set: &PackageSet) -> Result<PackageSet, OverlayError> {
    let mut acc = base.clone();
    let mut defined: HashMap<(i64, String), (usize, PackageDescriptor)> = HashMap::new();

    for (index, overlay) in self.overlays.iter().enumerate() {
      let delta = overlay.apply(ctx, &acc, final_set)?;
      trace!(overlay = overlay.name(), pass = ctx.pass, changed = delta.len(), "applied overlay");

      for (name, mut desc) in delta {
        let key = (overlay.order(), name.clone());

        if let Some((first, claimed)) = defined.get(&key) {
          if *first != index && !claimed.is_compatible_with(&desc) {
            return Err(OverlayError::Conflict {
              package: name,
              order: overlay.order(),
              first: self.overlays[*first].name().to_string(),
              first_pin: claimed.pin.clone(),
              second: overlay.name().to_string(),
              second_pin: desc.pin.clone(),
            });
          }

          // An unpinned refinement keeps the pin already claimed for this group.
          if desc.pin.is_none() {
            desc.pin = claimed.pin.clone();
          }
        }

        defined.insert(key, (index, desc.clone()));
        acc.insert(name, desc);
      }
    }

    Ok(acc)
  }
}
