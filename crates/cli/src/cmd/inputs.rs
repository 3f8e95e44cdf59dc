//! Implementation of the `pinenv inputs` command.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use pinenv_lib::inputs::InputRegistry;
use pinenv_lib::inputs::lock::{LOCK_FILENAME, LockFile};

use super::load_config;
use crate::output::{OutputFormat, print_json, short_pin, symbols};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InputOutput {
  name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pin: Option<String>,
  chain: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

/// List every declared input with its alias chain and pin.
///
/// Reads the lock file but never writes it. Inputs that fail to resolve are
/// listed with their error and make the command exit nonzero.
pub fn cmd_inputs(config: Option<&Path>, output: OutputFormat) -> Result<ExitCode> {
  let (config, config_dir) = load_config(config)?;
  let lock = LockFile::load(&config_dir.join(LOCK_FILENAME)).context("Failed to read lock file")?;
  let registry = InputRegistry::from_decls(&config.inputs, lock.as_ref()).context("Invalid inputs")?;

  let entries: Vec<InputOutput> = registry
    .names()
    .map(|name| match registry.resolve(name) {
      Ok(resolved) => InputOutput {
        name: name.to_string(),
        url: Some(resolved.url.clone()),
        pin: Some(resolved.pin.clone()),
        chain: resolved.chain.clone(),
        error: None,
      },
      Err(err) => InputOutput {
        name: name.to_string(),
        url: None,
        pin: None,
        chain: vec![name.to_string()],
        error: Some(err.to_string()),
      },
    })
    .collect();

  let failed = entries.iter().any(|e| e.error.is_some());

  if output.is_json() {
    print_json(&entries)?;
  } else {
    for entry in &entries {
      print_entry(entry);
    }
  }

  Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn print_entry(entry: &InputOutput) {
  if let Some(err) = &entry.error {
    println!(
      "{} {} {}",
      symbols::ERROR.if_supports_color(Stream::Stdout, |s| s.red()),
      entry.name.if_supports_color(Stream::Stdout, |s| s.cyan()),
      err.if_supports_color(Stream::Stdout, |s| s.red())
    );
    return;
  }

  let pin = entry.pin.as_deref().map(short_pin).unwrap_or_default();
  let url = entry.url.as_deref().unwrap_or_default();
  if entry.chain.len() > 1 {
    println!(
      "{} {} ({} {})",
      entry.name.if_supports_color(Stream::Stdout, |s| s.cyan()),
      entry.chain[1..].join(&format!(" {} ", symbols::ARROW)),
      url,
      pin.if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  } else {
    println!(
      "{} {} {}",
      entry.name.if_supports_color(Stream::Stdout, |s| s.cyan()),
      url,
      pin.if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }
}
