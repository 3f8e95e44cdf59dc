//! Named external sources and their pins.
//!
//! # Modules
//!
//! - [`registry`] - registration and alias resolution
//! - [`lock`] - lock file management for reproducible resolution
//! - [`types`] - input declarations and resolved inputs

pub mod lock;
pub mod registry;
mod types;

pub use registry::{InputError, InputRegistry};
pub use types::*;
