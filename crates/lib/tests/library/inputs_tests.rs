//! Alias chains and pinning.

use pinenv_lib::inputs::{InputError, InputRegistry, Locator};
use proptest::prelude::*;
use tracing_test::traced_test;

use super::common::registry;

#[test]
#[traced_test]
fn alias_resolves_to_concrete_pin() {
  let registry = registry();

  let resolved = registry.resolve("pkgs").unwrap();
  assert_eq!(resolved.pin, "hash123");
  assert_eq!(resolved.url, "github:nixos/nixpkgs/nixos-24.05");
  assert_eq!(resolved.chain, ["pkgs", "nixpkgs"]);
  assert!(logs_contain("resolved input"));
}

#[test]
fn every_input_resolves_once_for_the_run() {
  let pinned = registry().resolve_all().unwrap();
  assert_eq!(pinned.len(), 2);
  assert_eq!(pinned["pkgs"].pin, pinned["nixpkgs"].pin);
  assert!(!pinned["nixpkgs"].is_aliased());
}

/// `len` inputs `i0 -> i1 -> ... -> i{len-1}`, the last one either concrete or
/// following `i{back}`.
fn chain(len: usize, back: Option<usize>) -> InputRegistry {
  let mut registry = InputRegistry::new();
  for i in 0..len {
    let name = format!("i{i}");
    if i + 1 < len {
      registry
        .register(&name, Locator::Follows(format!("i{}", i + 1)), None)
        .unwrap();
    } else {
      match back {
        Some(target) => registry
          .register(&name, Locator::Follows(format!("i{target}")), None)
          .unwrap(),
        None => registry
          .register(&name, Locator::Url("path:./pkgs".into()), Some("sha256:end".into()))
          .unwrap(),
      }
    }
  }
  registry
}

proptest! {
  #[test]
  fn acyclic_chains_terminate_at_the_concrete_input(len in 1usize..24, start in 0usize..24) {
    let start = start % len;
    let registry = chain(len, None);

    let resolved = registry.resolve(&format!("i{start}")).unwrap();
    prop_assert_eq!(&resolved.pin, "sha256:end");
    prop_assert_eq!(resolved.chain.len(), len - start);
    prop_assert_eq!(resolved.source(), format!("i{}", len - 1));
  }

  #[test]
  fn cyclic_chains_are_reported_from_every_member(len in 1usize..24, back in 0usize..24, start in 0usize..24) {
    let back = back % len;
    let start = start % len;
    let registry = chain(len, Some(back));

    match registry.resolve(&format!("i{start}")) {
      Err(InputError::CyclicAlias { chain }) => {
        prop_assert_eq!(chain.first(), Some(&format!("i{start}")));
        let last = chain.last().unwrap();
        prop_assert_eq!(chain.iter().filter(|name| *name == last).count(), 2);
      }
      other => prop_assert!(false, "expected cycle, got {:?}", other),
    }
  }
}
