//! Inputs through activation-ready environments.

use std::collections::BTreeMap;

use pinenv_lib::engine::PlatformError;
use pinenv_lib::matrix::{Cancellation, MatrixOptions, PlatformOutcome};
use pinenv_lib::overlay::OverlayStack;
use pinenv_lib::repository::FetchError;
use pinenv_lib::resolver::ResolveError;
use tempfile::TempDir;

use super::common::{RUST_OVERLAY, engine, overlay, platform};

#[test]
fn rust_toolchain_environment_on_linux() {
  let temp = TempDir::new().unwrap();
  let linux = platform("x86_64-linux");
  let engine = engine(
    temp.path(),
    OverlayStack::new().with(overlay(RUST_OVERLAY)),
    &["rustToolchain", "cargo"],
  );

  let report = engine
    .run(&[linux], &MatrixOptions::default(), &Cancellation::new())
    .unwrap();
  assert!(report.all_ok());

  let env = report.get(linux).and_then(PlatformOutcome::ok).unwrap();
  let names: Vec<&str> = env.packages.iter().map(|p| p.name.as_str()).collect();
  assert_eq!(names, ["rustToolchain", "cargo"]);
  assert_eq!(env.packages[0].version, "1.88.0");
  assert!(env.packages[1].build_inputs.contains("rustToolchain"));
  assert_eq!(env.packages[1].version, "1.80.0");

  let toolchain = env.store_path("rustToolchain").unwrap();
  assert!(toolchain.starts_with(temp.path().join("store")));
  assert!(
    toolchain
      .file_name()
      .unwrap()
      .to_string_lossy()
      .ends_with("-rustToolchain-1.88.0")
  );
  assert_eq!(
    env.variables["RUST_SRC_PATH"],
    format!("{}/lib/rustlib/src/rust/library", toolchain.display())
  );
}

#[test]
fn results_are_deterministic_across_runs() {
  let temp = TempDir::new().unwrap();
  let platforms = [platform("x86_64-linux"), platform("aarch64-darwin")];

  let first = engine(
    temp.path(),
    OverlayStack::new().with(overlay(RUST_OVERLAY)),
    &["rustToolchain", "ripgrep"],
  )
  .run(&platforms, &MatrixOptions::default(), &Cancellation::new())
  .unwrap();

  let second = engine(
    temp.path(),
    OverlayStack::new().with(overlay(RUST_OVERLAY)),
    &["rustToolchain", "ripgrep"],
  )
  .run(
    &platforms,
    &MatrixOptions {
      fail_fast: false,
      parallelism: Some(1),
    },
    &Cancellation::new(),
  )
  .unwrap();

  for p in platforms {
    assert_eq!(
      first.get(p).and_then(PlatformOutcome::ok),
      second.get(p).and_then(PlatformOutcome::ok)
    );
  }
}

#[test]
fn extra_variables_override_package_contributions() {
  let temp = TempDir::new().unwrap();
  let linux = platform("x86_64-linux");
  let mut extra = BTreeMap::new();
  extra.insert("RUST_SRC_PATH".to_string(), "/custom".to_string());
  extra.insert("RG".to_string(), "$${pkg:ripgrep}/bin/rg".to_string());

  let engine = engine(
    temp.path(),
    OverlayStack::new().with(overlay(RUST_OVERLAY)),
    &["rustToolchain"],
  )
  .with_selection(vec!["rustToolchain".into()], extra);

  let pinned = engine.pinned_inputs().unwrap();
  let env = engine.environment(linux, &pinned).unwrap();
  assert_eq!(env.variables["RUST_SRC_PATH"], "/custom");
  assert!(env.variables["RG"].ends_with("-ripgrep-14.1.0/bin/rg"));
}

#[test]
fn dangling_build_input_fails_only_that_platform() {
  let temp = TempDir::new().unwrap();
  let linux = platform("x86_64-linux");
  let darwin = platform("aarch64-darwin");

  let broken = overlay(
    r#"{
      "name": "broken",
      "platforms": ["x86_64-linux"],
      "packages": { "ripgrep": { "extends": "ripgrep", "buildInputs": ["pcre2"] } }
    }"#,
  );
  let engine = engine(temp.path(), OverlayStack::new().with(broken), &["ripgrep"]);

  let report = engine
    .run(&[linux, darwin], &MatrixOptions::default(), &Cancellation::new())
    .unwrap();

  match report.get(linux) {
    Some(PlatformOutcome::Err(PlatformError::Resolve(ResolveError::DanglingDependency { package, missing }))) => {
      assert_eq!(package, "ripgrep");
      assert_eq!(missing, "pcre2");
    }
    other => panic!("expected dangling dependency, got {other:?}"),
  }
  assert!(report.get(darwin).unwrap().is_ok());
  assert!(!report.is_fatal());
}

#[test]
fn unavailable_platform_is_reported() {
  let temp = TempDir::new().unwrap();
  let windows = platform("x86_64-windows");
  let engine = engine(temp.path(), OverlayStack::new(), &[]);

  let report = engine
    .run(&[windows], &MatrixOptions::default(), &Cancellation::new())
    .unwrap();

  assert!(matches!(
    report.get(windows),
    Some(PlatformOutcome::Err(PlatformError::Resolve(ResolveError::Fetch(
      FetchError::Unavailable { .. }
    ))))
  ));
  assert!(!report.is_fatal());
}

#[test]
fn fail_fast_report_is_fatal() {
  let temp = TempDir::new().unwrap();
  let windows = platform("x86_64-windows");
  let linux = platform("x86_64-linux");
  let engine = engine(temp.path(), OverlayStack::new(), &[]);

  let report = engine
    .run(
      &[windows, linux],
      &MatrixOptions {
        fail_fast: true,
        parallelism: Some(1),
      },
      &Cancellation::new(),
    )
    .unwrap();

  assert!(report.is_fatal());
  assert_eq!(report.failures().count(), 1);
  assert_eq!(report.results[0].0, windows);
  assert_eq!(report.results[1].0, linux);
}
