//! pinenv-lib: hermetic environment resolution.
//!
//! - `inputs`: named, pinned external sources and `follows` aliases
//! - `overlay`: ordered `(prev, final)` package set transformations
//! - `resolver`: per-platform package sets, validated for dangling references and cycles
//! - `matrix`: isolated per-platform fan-out
//! - `compose`: selected packages and variables as an `EnvironmentDescriptor`
//! - `engine`: the whole pipeline, wired from a `pinenv.json`

pub mod activation;
pub mod compose;
pub mod config;
pub mod consts;
pub mod engine;
pub mod inputs;
pub mod matrix;
pub mod overlay;
pub mod pkgs;
pub mod placeholder;
pub mod platform;
pub mod repository;
pub mod resolver;
pub mod util;
