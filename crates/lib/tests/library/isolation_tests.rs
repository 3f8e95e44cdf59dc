//! Platforms never observe each other.

use std::sync::atomic::{AtomicUsize, Ordering};

use pinenv_lib::matrix::{Cancellation, MatrixOptions, PlatformOutcome, for_each_platform};
use pinenv_lib::overlay::{FnOverlay, OverlayStack};
use pinenv_lib::pkgs::PackageDescriptor;
use tempfile::TempDir;

use super::common::{engine, overlay, platform};

#[test]
fn platform_restricted_overlay_only_touches_its_platform() {
  let temp = TempDir::new().unwrap();
  let linux = platform("x86_64-linux");
  let darwin = platform("aarch64-darwin");

  let linux_only = overlay(
    r#"{
      "name": "linux-only",
      "platforms": ["x86_64-linux"],
      "packages": { "strace": { "version": "6.9" } }
    }"#,
  );
  let engine = engine(temp.path(), OverlayStack::new().with(linux_only), &["strace"]);

  let report = engine
    .run(&[linux, darwin], &MatrixOptions::default(), &Cancellation::new())
    .unwrap();

  assert!(report.get(linux).unwrap().is_ok());
  let err = report.get(darwin).and_then(PlatformOutcome::err).unwrap();
  assert!(err.to_string().contains("not available on aarch64-darwin: strace"));
}

#[test]
fn overlays_see_only_their_own_platform() {
  let temp = TempDir::new().unwrap();
  let linux = platform("x86_64-linux");
  let darwin = platform("aarch64-darwin");

  let tagged = FnOverlay::new("tagged", 0, |ctx, prev, _final| {
    prev
      .values()
      .map(|p| {
        assert_eq!(p.platform, ctx.platform);
        let tagged = p.clone().with_env("PINENV_PLATFORM", ctx.platform.to_string());
        (p.name.clone(), tagged)
      })
      .collect()
  });
  let engine = engine(temp.path(), OverlayStack::new().with(tagged), &["ripgrep"]);

  let report = engine
    .run(&[linux, darwin], &MatrixOptions::default(), &Cancellation::new())
    .unwrap();

  for p in [linux, darwin] {
    let env = report.get(p).and_then(PlatformOutcome::ok).unwrap();
    assert_eq!(env.variables["PINENV_PLATFORM"], p.to_string());
    assert!(env.packages.iter().all(|pkg: &PackageDescriptor| pkg.platform == p));
  }
}

#[test]
fn cancelling_one_platform_leaves_the_rest() {
  let linux = platform("x86_64-linux");
  let darwin = platform("aarch64-darwin");
  let windows = platform("x86_64-windows");
  let calls = AtomicUsize::new(0);

  let cancel = Cancellation::new();
  cancel.cancel(darwin);

  let report = for_each_platform(&[linux, darwin, windows], &MatrixOptions::default(), &cancel, |p| {
    calls.fetch_add(1, Ordering::SeqCst);
    Ok::<_, String>(p.to_string())
  });

  assert_eq!(calls.load(Ordering::SeqCst), 2);
  assert_eq!(report.cancelled().collect::<Vec<_>>(), [darwin]);
  assert_eq!(report.get(linux).and_then(PlatformOutcome::ok).unwrap(), "x86_64-linux");
  assert!(!cancel.is_cancelled(linux));
}

#[test]
fn fail_fast_does_not_cancel_the_callers_token() {
  let linux = platform("x86_64-linux");
  let cancel = Cancellation::new();

  let report = for_each_platform(
    &[linux],
    &MatrixOptions {
      fail_fast: true,
      parallelism: None,
    },
    &cancel,
    |_| Err::<(), _>("boom".to_string()),
  );

  assert!(report.is_fatal());
  assert!(!cancel.is_cancelled(linux));
}
