//! The top-level operation.
//!
//! Pins inputs once, then resolves and composes every requested platform in
//! isolation:
//!
//! ```text
//! inputs -> pins -> (per platform) base set -> overlays -> validation -> environment
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::compose::{ComposeError, EnvironmentComposer, EnvironmentDescriptor};
use crate::config::{Config, ConfigError};
use crate::inputs::lock::{LOCK_FILENAME, LockError, LockFile, LockResult, lock_inputs, save_lock_file_if_changed};
use crate::inputs::{InputError, InputRegistry, PinnedInputs};
use crate::matrix::{Cancellation, MatrixOptions, MatrixReport, for_each_platform};
use crate::overlay::{DeclarativeOverlay, OverlayError, OverlayStack};
use crate::pkgs::PackageSet;
use crate::platform::Platform;
use crate::repository::{FetchError, PackageRepository, SnapshotRepository};
use crate::resolver::{PackageSetResolver, ResolveError};

/// Failures that stop a run before any platform is evaluated.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Lock(#[from] LockError),

  #[error(transparent)]
  Input(#[from] InputError),

  #[error(transparent)]
  Overlay(#[from] OverlayError),

  #[error("failed to load package repository: {0}")]
  Repository(#[from] FetchError),
}

/// Failure of a single platform.
#[derive(Debug, Error)]
pub enum PlatformError {
  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  Compose(#[from] ComposeError),
}

/// Per-platform environments of one run.
pub type EngineReport = MatrixReport<EnvironmentDescriptor, PlatformError>;

/// Lock handling when building an engine from a config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockMode {
  /// Pin new inputs and write the lock file if it changed.
  #[default]
  Write,
  /// Pin new inputs in memory only.
  ReadOnly,
}

/// Everything one resolution run needs. Immutable once built.
pub struct Engine {
  registry: InputRegistry,
  repository: Box<dyn PackageRepository>,
  overlays: OverlayStack,
  composer: EnvironmentComposer,
  selection: Vec<String>,
  extra: BTreeMap<String, String>,
}

impl Engine {
  pub fn new(
    registry: InputRegistry,
    repository: impl PackageRepository + 'static,
    overlays: OverlayStack,
    composer: EnvironmentComposer,
  ) -> Self {
    Self {
      registry,
      repository: Box::new(repository),
      overlays,
      composer,
      selection: Vec::new(),
      extra: BTreeMap::new(),
    }
  }

  /// Packages to expose and variables that override their contributions.
  pub fn with_selection(mut self, packages: Vec<String>, extra: BTreeMap<String, String>) -> Self {
    self.selection = packages;
    self.extra = extra;
    self
  }

  /// Wire an engine from a loaded config.
  ///
  /// Relative paths resolve against `config_dir`. Inputs without a pin are
  /// pinned through `pinenv.lock`.
  pub fn from_config(config: &Config, config_dir: &Path, lock_mode: LockMode) -> Result<Self, EngineError> {
    let repository = SnapshotRepository::load(
      &config.repository.input,
      &config.repository_path(config_dir),
      config_dir,
    )?;

    let lock = lock_config(config, config_dir, &repository, None)?;
    if lock_mode == LockMode::Write {
      save_lock_file_if_changed(&lock, config_dir)?;
    }

    let registry = InputRegistry::from_decls(&config.inputs, Some(&lock.lock_file))?;
    registry.resolve(&config.repository.input)?;

    let mut overlays = OverlayStack::new();
    for decl in &config.overlays {
      overlays.push(DeclarativeOverlay::try_from(decl.clone())?);
    }

    let composer = EnvironmentComposer::new(config.store_dir(config_dir));

    info!(
      inputs = registry.len(),
      overlays = overlays.len(),
      packages = config.shell.packages.len(),
      "engine ready"
    );

    Ok(
      Self::new(registry, repository, overlays, composer)
        .with_selection(config.shell.packages.clone(), config.shell.env.clone()),
    )
  }

  pub fn registry(&self) -> &InputRegistry {
    &self.registry
  }

  pub fn overlays(&self) -> &OverlayStack {
    &self.overlays
  }

  pub fn selection(&self) -> &[String] {
    &self.selection
  }

  /// Resolve every input once for the whole run.
  pub fn pinned_inputs(&self) -> Result<PinnedInputs, EngineError> {
    Ok(self.registry.resolve_all()?)
  }

  /// The final package set for one platform.
  pub fn package_set(&self, platform: Platform, pinned: &PinnedInputs) -> Result<PackageSet, PlatformError> {
    Ok(PackageSetResolver::new(self.repository.as_ref(), &self.overlays).resolve(platform, pinned)?)
  }

  /// Resolve and compose one platform.
  pub fn environment(&self, platform: Platform, pinned: &PinnedInputs) -> Result<EnvironmentDescriptor, PlatformError> {
    let set = self.package_set(platform, pinned)?;
    Ok(self.composer.compose(platform, &set, &self.selection, &self.extra)?)
  }

  /// Resolve every platform. Per-platform failures are part of the report.
  pub fn run(
    &self,
    platforms: &[Platform],
    options: &MatrixOptions,
    cancel: &Cancellation,
  ) -> Result<EngineReport, EngineError> {
    let pinned = self.pinned_inputs()?;
    debug!(platforms = platforms.len(), fail_fast = options.fail_fast, "starting run");

    let report = for_each_platform(platforms, options, cancel, |platform| self.environment(platform, &pinned));

    info!(
      ok = report.successes().count(),
      failed = report.failures().count(),
      cancelled = report.cancelled().count(),
      "run finished"
    );
    Ok(report)
  }
}

/// Pin the config's inputs against the existing lock file without writing it.
///
/// `force` re-pins the named inputs, or every input if the set is empty.
pub fn lock_config(
  config: &Config,
  config_dir: &Path,
  repository: &dyn PackageRepository,
  force: Option<&BTreeSet<String>>,
) -> Result<LockResult, EngineError> {
  let existing = LockFile::load(&config_dir.join(LOCK_FILENAME))?;
  Ok(lock_inputs(
    &config.inputs,
    existing.as_ref(),
    repository,
    config_dir,
    force,
  )?)
}

/// `pinenv lock`: pin inputs and write the lock file unless `dry_run`.
pub fn update_lock(
  config: &Config,
  config_dir: &Path,
  force: Option<&BTreeSet<String>>,
  dry_run: bool,
) -> Result<LockResult, EngineError> {
  let repository = SnapshotRepository::load(
    &config.repository.input,
    &config.repository_path(config_dir),
    config_dir,
  )?;

  let result = lock_config(config, config_dir, &repository, force)?;
  if !dry_run {
    save_lock_file_if_changed(&result, config_dir)?;
  }
  Ok(result)
}
