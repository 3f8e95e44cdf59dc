//! Shared fixtures for library integration tests.

use std::collections::BTreeMap;
use std::path::Path;

use pinenv_lib::compose::EnvironmentComposer;
use pinenv_lib::engine::Engine;
use pinenv_lib::inputs::{InputRegistry, Locator};
use pinenv_lib::overlay::{DeclarativeOverlay, OverlayDecl, OverlayStack};
use pinenv_lib::pkgs::{PackageDescriptor, PackageSet};
use pinenv_lib::platform::Platform;
use pinenv_lib::repository::SnapshotRepository;

pub fn platform(triple: &str) -> Platform {
  triple.parse().unwrap()
}

pub fn set(pkgs: &[PackageDescriptor]) -> PackageSet {
  pkgs.iter().map(|p| (p.name.clone(), p.clone())).collect()
}

/// `nixpkgs` pinned to `hash123`, and `pkgs` following it.
pub fn registry() -> InputRegistry {
  let mut registry = InputRegistry::new();
  registry
    .register(
      "nixpkgs",
      Locator::Url("github:nixos/nixpkgs/nixos-24.05".into()),
      Some("hash123".into()),
    )
    .unwrap();
  registry
    .register("pkgs", Locator::Follows("nixpkgs".into()), None)
    .unwrap();
  registry
}

/// Base sets for linux and darwin. Nothing for windows.
pub fn repository(root: &Path) -> SnapshotRepository {
  let linux = platform("x86_64-linux");
  let darwin = platform("aarch64-darwin");
  SnapshotRepository::new("pkgs", root)
    .with_set(
      "hash123",
      linux,
      &set(&[
        PackageDescriptor::new("cargo", "1.80.0", linux),
        PackageDescriptor::new("ripgrep", "14.1.0", linux),
      ]),
    )
    .with_set(
      "hash123",
      darwin,
      &set(&[
        PackageDescriptor::new("cargo", "1.80.0", darwin),
        PackageDescriptor::new("ripgrep", "14.1.0", darwin),
      ]),
    )
}

pub fn overlay(json: &str) -> DeclarativeOverlay {
  let decl: OverlayDecl = serde_json::from_str(json).unwrap();
  DeclarativeOverlay::try_from(decl).unwrap()
}

/// Adds `rustToolchain` 1.88.0 and makes `cargo` depend on it.
pub const RUST_OVERLAY: &str = r#"{
  "name": "rust",
  "order": 10,
  "packages": {
    "rustToolchain": {
      "version": "1.88.0",
      "env": { "RUST_SRC_PATH": "$${out}/lib/rustlib/src/rust/library" }
    },
    "cargo": { "extends": "cargo", "buildInputs": ["rustToolchain"] }
  }
}"#;

pub fn engine(root: &Path, overlays: OverlayStack, selection: &[&str]) -> Engine {
  Engine::new(
    registry(),
    repository(root),
    overlays,
    EnvironmentComposer::new(root.join("store")),
  )
  .with_selection(selection.iter().map(|s| s.to_string()).collect(), BTreeMap::new())
}
