//! Implementation of the `pinenv lock` command.
//!
//! Pins every concrete input that has no pin yet and writes `pinenv.lock`.
//! Named inputs (or all of them with `--all`) are re-pinned even if locked.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};

use pinenv_lib::engine::update_lock;
use pinenv_lib::inputs::lock::LOCK_FILENAME;

use super::load_config;
use crate::output::{format_duration, print_success, short_pin, symbols};

pub fn cmd_lock(config: Option<&Path>, inputs: Vec<String>, all: bool, dry_run: bool) -> Result<()> {
  let start = Instant::now();
  let (config, config_dir) = load_config(config)?;

  let force: Option<BTreeSet<String>> = if all {
    Some(BTreeSet::new())
  } else if inputs.is_empty() {
    None
  } else {
    for name in &inputs {
      if !config.inputs.contains_key(name) {
        anyhow::bail!("unknown input '{name}'");
      }
    }
    Some(inputs.into_iter().collect())
  };

  let result = update_lock(&config, &config_dir, force.as_ref(), dry_run).context("Failed to lock inputs")?;

  if dry_run {
    println!("{}", "Dry run - no changes written".if_supports_color(Stream::Stdout, |s| s.yellow()));
    println!();
  }

  for (name, (old_pin, new_pin)) in &result.updated {
    let prefix = if dry_run { "Would update" } else { "Updated" };
    println!(
      "  {} {}: {} {} {}",
      symbols::MODIFY.if_supports_color(Stream::Stdout, |s| s.yellow()),
      prefix,
      name.if_supports_color(Stream::Stdout, |s| s.cyan()),
      format!("{} {}", short_pin(old_pin), symbols::ARROW).if_supports_color(Stream::Stdout, |s| s.dimmed()),
      short_pin(new_pin).if_supports_color(Stream::Stdout, |s| s.green())
    );
  }

  for name in &result.added {
    let prefix = if dry_run { "Would add" } else { "Added" };
    let pin = result.lock_file.get(name).map(|locked| short_pin(&locked.pin)).unwrap_or_default();
    println!(
      "  {} {}: {} ({})",
      symbols::ADD.if_supports_color(Stream::Stdout, |s| s.green()),
      prefix,
      name.if_supports_color(Stream::Stdout, |s| s.cyan()),
      pin.if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }

  for name in &result.removed {
    let prefix = if dry_run { "Would remove" } else { "Removed" };
    println!(
      "  {} {}: {}",
      symbols::REMOVE.if_supports_color(Stream::Stdout, |s| s.red()),
      prefix,
      name.if_supports_color(Stream::Stdout, |s| s.cyan())
    );
  }

  if !result.changed {
    print_success("All inputs are pinned.");
  } else if !dry_run {
    println!();
    print_success(&format!("Lock file updated: {}", config_dir.join(LOCK_FILENAME).display()));
    println!(
      "  {} Duration: {}",
      symbols::INFO.if_supports_color(Stream::Stdout, |s| s.dimmed()),
      format_duration(start.elapsed()).if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }

  Ok(())
}
