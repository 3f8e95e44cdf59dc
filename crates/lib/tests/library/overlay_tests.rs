//! Overlay stacks driven through the package set resolver.

use std::collections::BTreeMap;

use pinenv_lib::inputs::PinnedInputs;
use pinenv_lib::overlay::{FnOverlay, OverlayError, OverlayStack};
use pinenv_lib::pkgs::PackageDescriptor;
use pinenv_lib::resolver::{PackageSetResolver, ResolveError};
use proptest::prelude::*;
use tempfile::TempDir;

use super::common::{RUST_OVERLAY, overlay, platform, registry, repository};

fn pinned() -> PinnedInputs {
  registry().resolve_all().unwrap()
}

#[test]
fn alias_sees_later_overlays_through_final() {
  let temp = TempDir::new().unwrap();
  let linux = platform("x86_64-linux");
  let repo = repository(temp.path());

  // The alias overlay runs first but must see the toolchain defined after it.
  let overlays = OverlayStack::new()
    .with(overlay(
      r#"{ "name": "aliases", "packages": { "rust": { "alias": "rustToolchain" } } }"#,
    ))
    .with(overlay(RUST_OVERLAY));

  let set = PackageSetResolver::new(&repo, &overlays).resolve(linux, &pinned()).unwrap();
  assert_eq!(set["rust"].name, "rust");
  assert_eq!(set["rust"].version, "1.88.0");
  assert_eq!(set["rust"].env, set["rustToolchain"].env);
}

#[test]
fn later_overlay_wins_across_orders() {
  let temp = TempDir::new().unwrap();
  let linux = platform("x86_64-linux");
  let repo = repository(temp.path());

  let overlays = OverlayStack::new()
    .with(overlay(
      r#"{ "name": "a", "order": 1, "packages": { "ripgrep": { "version": "13.0.0", "pin": "sha256:a" } } }"#,
    ))
    .with(overlay(
      r#"{ "name": "b", "order": 2, "packages": { "ripgrep": { "version": "15.0.0", "pin": "sha256:b" } } }"#,
    ));

  let set = PackageSetResolver::new(&repo, &overlays).resolve(linux, &pinned()).unwrap();
  assert_eq!(set["ripgrep"].version, "15.0.0");
}

#[test]
fn same_order_different_pins_conflict() {
  let temp = TempDir::new().unwrap();
  let linux = platform("x86_64-linux");
  let repo = repository(temp.path());

  let overlays = OverlayStack::new()
    .with(overlay(
      r#"{ "name": "a", "order": 1, "packages": { "ripgrep": { "version": "14.1.0", "pin": "sha256:a" } } }"#,
    ))
    .with(overlay(
      r#"{ "name": "b", "order": 1, "packages": { "ripgrep": { "version": "14.1.0", "pin": "sha256:b" } } }"#,
    ));

  let err = PackageSetResolver::new(&repo, &overlays)
    .resolve(linux, &pinned())
    .unwrap_err();
  match err {
    ResolveError::Overlay(OverlayError::Conflict {
      package, first, second, ..
    }) => {
      assert_eq!(package, "ripgrep");
      assert_eq!(first, "a");
      assert_eq!(second, "b");
    }
    other => panic!("expected conflict, got {other:?}"),
  }
}

#[test]
fn non_converging_stack_is_an_error() {
  let temp = TempDir::new().unwrap();
  let linux = platform("x86_64-linux");
  let repo = repository(temp.path());

  // Each pass bumps a counter read from the previous pass's result.
  let counter = FnOverlay::new("counter", 0, move |ctx, _prev, final_set| {
    let n: u64 = final_set
      .get("counter")
      .and_then(|p| p.version.parse().ok())
      .unwrap_or(0);
    BTreeMap::from([(
      "counter".to_string(),
      PackageDescriptor::new("counter", (n + 1).to_string(), ctx.platform),
    )])
  });
  let overlays = OverlayStack::new().with(counter);

  let err = PackageSetResolver::new(&repo, &overlays)
    .resolve(linux, &pinned())
    .unwrap_err();
  assert!(matches!(err, ResolveError::Overlay(OverlayError::Diverged { .. })));
}

proptest! {
  /// Independent of how many alias hops there are or where they sit in the
  /// stack, aliases all end up with the toolchain overlay's version.
  #[test]
  fn alias_chains_converge(hops in 1usize..8, alias_first in any::<bool>()) {
    let temp = TempDir::new().unwrap();
    let linux = platform("x86_64-linux");
    let repo = repository(temp.path());

    let mut packages = serde_json::Map::new();
    packages.insert("alias0".into(), serde_json::json!({ "alias": "rustToolchain" }));
    for i in 1..hops {
      packages.insert(format!("alias{i}"), serde_json::json!({ "alias": format!("alias{}", i - 1) }));
    }
    let aliases = serde_json::json!({ "name": "aliases", "packages": packages }).to_string();

    let overlays = if alias_first {
      OverlayStack::new().with(overlay(&aliases)).with(overlay(RUST_OVERLAY))
    } else {
      OverlayStack::new().with(overlay(RUST_OVERLAY)).with(overlay(&aliases))
    };

    let resolver = PackageSetResolver::new(&repo, &overlays);
    let first = resolver.resolve(linux, &pinned()).unwrap();
    let second = resolver.resolve(linux, &pinned()).unwrap();
    prop_assert_eq!(&first, &second);

    for i in 0..hops {
      prop_assert_eq!(&first[&format!("alias{i}")].version, "1.88.0");
    }
  }
}
