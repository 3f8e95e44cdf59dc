//! Per-platform fan-out.
//!
//! Every platform is evaluated by its own call of the supplied function, on a
//! rayon pool. The function only receives the platform; whatever it shares
//! with sibling calls must be immutable. One platform failing is recorded in
//! the report and does not stop the others unless `fail_fast` is set, in which
//! case platforms that have not started yet are reported as cancelled.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use rayon::prelude::*;
use tracing::{debug, info_span, warn};

use crate::platform::Platform;

/// Cancels a whole matrix run or single platforms of it.
///
/// Clones share state. Cancellation is checked before a platform starts;
/// a platform that is already running finishes and keeps its result.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
  inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
  all: AtomicBool,
  platforms: RwLock<BTreeSet<Platform>>,
}

impl Cancellation {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel_all(&self) {
    self.inner.all.store(true, Ordering::SeqCst);
  }

  pub fn cancel(&self, platform: Platform) {
    self
      .inner
      .platforms
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(platform);
  }

  pub fn is_cancelled(&self, platform: Platform) -> bool {
    self.inner.all.load(Ordering::SeqCst)
      || self
        .inner
        .platforms
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&platform)
  }
}

/// Options for a matrix run.
#[derive(Debug, Clone, Default)]
pub struct MatrixOptions {
  /// Skip platforms that have not started once any platform fails.
  pub fail_fast: bool,
  /// Worker threads. `None` uses rayon's default.
  pub parallelism: Option<usize>,
}

/// What happened to one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformOutcome<T, E> {
  Ok(T),
  Err(E),
  Cancelled,
}

impl<T, E> PlatformOutcome<T, E> {
  pub fn is_ok(&self) -> bool {
    matches!(self, PlatformOutcome::Ok(_))
  }

  pub fn ok(&self) -> Option<&T> {
    match self {
      PlatformOutcome::Ok(value) => Some(value),
      _ => None,
    }
  }

  pub fn err(&self) -> Option<&E> {
    match self {
      PlatformOutcome::Err(err) => Some(err),
      _ => None,
    }
  }
}

/// Outcomes in requested platform order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixReport<T, E> {
  pub results: Vec<(Platform, PlatformOutcome<T, E>)>,
  /// Whether the run was started in fail-fast mode.
  pub fail_fast: bool,
}

impl<T, E> MatrixReport<T, E> {
  pub fn get(&self, platform: Platform) -> Option<&PlatformOutcome<T, E>> {
    self.results.iter().find(|(p, _)| *p == platform).map(|(_, o)| o)
  }

  pub fn successes(&self) -> impl Iterator<Item = (Platform, &T)> {
    self.results.iter().filter_map(|(p, o)| o.ok().map(|v| (*p, v)))
  }

  pub fn failures(&self) -> impl Iterator<Item = (Platform, &E)> {
    self.results.iter().filter_map(|(p, o)| o.err().map(|e| (*p, e)))
  }

  pub fn cancelled(&self) -> impl Iterator<Item = Platform> + '_ {
    self
      .results
      .iter()
      .filter(|(_, o)| matches!(o, PlatformOutcome::Cancelled))
      .map(|(p, _)| *p)
  }

  /// Every platform produced a value.
  pub fn all_ok(&self) -> bool {
    self.results.iter().all(|(_, o)| o.is_ok())
  }

  /// A fail-fast run in which some platform failed. Cancelled platforms alone
  /// are not fatal.
  pub fn is_fatal(&self) -> bool {
    self.fail_fast && self.failures().next().is_some()
  }
}

/// Evaluate `f` once per platform.
///
/// Duplicate platforms are evaluated once, at their first position.
pub fn for_each_platform<T, E, F>(
  platforms: &[Platform],
  options: &MatrixOptions,
  cancel: &Cancellation,
  f: F,
) -> MatrixReport<T, E>
where
  F: Fn(Platform) -> Result<T, E> + Sync,
  T: Send,
  E: Send + std::fmt::Display,
{
  let mut seen = HashSet::new();
  let platforms: Vec<Platform> = platforms.iter().copied().filter(|p| seen.insert(*p)).collect();

  // Local to this run so fail-fast never cancels the caller's token.
  let aborted = AtomicBool::new(false);

  let run = || {
    platforms
      .par_iter()
      .map(|&platform| {
        if aborted.load(Ordering::SeqCst) || cancel.is_cancelled(platform) {
          debug!(%platform, "platform cancelled before start");
          return (platform, PlatformOutcome::Cancelled);
        }

        let _span = info_span!("platform", %platform).entered();
        match f(platform) {
          Ok(value) => (platform, PlatformOutcome::Ok(value)),
          Err(err) => {
            warn!(error = %err, "platform failed");
            if options.fail_fast {
              aborted.store(true, Ordering::SeqCst);
            }
            (platform, PlatformOutcome::Err(err))
          }
        }
      })
      .collect::<Vec<_>>()
  };

  let results = match options.parallelism {
    Some(threads) => match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
      Ok(pool) => pool.install(run),
      Err(err) => {
        warn!(error = %err, "could not build thread pool, using the global pool");
        run()
      }
    },
    None => run(),
  };

  MatrixReport {
    results,
    fail_fast: options.fail_fast,
  }
}
