//! Activation scripts for composed environments.
//!
//! Rendering only: the script exports the environment's variables and puts
//! each selected package's `bin` directory on `PATH`. Running it is up to
//! the caller's shell.

use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::compose::EnvironmentDescriptor;

/// Supported shell types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
  Bash,
  Zsh,
  Fish,
  PowerShell,
  Sh,
}

impl Shell {
  /// Detect the current shell from `$SHELL`, falling back to the platform default.
  pub fn detect() -> Self {
    if let Ok(shell) = env::var("SHELL") {
      let name = Path::new(&shell)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

      return name.parse().unwrap_or(Shell::Sh);
    }

    if cfg!(windows) { Shell::PowerShell } else { Shell::Sh }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Shell::Bash => "bash",
      Shell::Zsh => "zsh",
      Shell::Fish => "fish",
      Shell::PowerShell => "powershell",
      Shell::Sh => "sh",
    }
  }

  /// Statement setting an environment variable.
  pub fn export_var(&self, name: &str, value: &str) -> String {
    match self {
      Shell::Fish => format!("set -gx {} {}", name, quote_fish(value)),
      Shell::PowerShell => format!("$env:{} = {}", name, quote_powershell(value)),
      Shell::Bash | Shell::Zsh | Shell::Sh => format!("export {}={}", name, quote_posix(value)),
    }
  }

  /// Statement prepending a directory to a PATH-like variable.
  pub fn prepend_path(&self, name: &str, dir: &str) -> String {
    match self {
      Shell::Fish => format!("set -gx {} {} ${}", name, quote_fish(dir), name),
      Shell::PowerShell => format!(
        "$env:{} = {} + [IO.Path]::PathSeparator + $env:{}",
        name,
        quote_powershell(dir),
        name
      ),
      Shell::Bash | Shell::Zsh | Shell::Sh => format!("export {}={}:\"${}\"", name, quote_posix(dir), name),
    }
  }

  pub fn comment(&self, text: &str) -> String {
    format!("# {text}")
  }

  pub fn header(&self) -> Option<&'static str> {
    match self {
      Shell::Bash => Some("#!/usr/bin/env bash"),
      Shell::Zsh => Some("#!/usr/bin/env zsh"),
      Shell::Sh => Some("#!/bin/sh"),
      Shell::Fish | Shell::PowerShell => None,
    }
  }
}

impl FromStr for Shell {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "bash" => Ok(Shell::Bash),
      "zsh" => Ok(Shell::Zsh),
      "fish" => Ok(Shell::Fish),
      "sh" | "dash" => Ok(Shell::Sh),
      "pwsh" | "powershell" => Ok(Shell::PowerShell),
      other => Err(format!("unsupported shell '{other}'")),
    }
  }
}

impl fmt::Display for Shell {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

// Double quotes keep `$VAR` references in values expandable.
fn quote_posix(value: &str) -> String {
  let mut out = String::with_capacity(value.len() + 2);
  out.push('"');
  for c in value.chars() {
    if matches!(c, '"' | '\\' | '`') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('"');
  out
}

fn quote_fish(value: &str) -> String {
  let mut out = String::with_capacity(value.len() + 2);
  out.push('"');
  for c in value.chars() {
    if matches!(c, '"' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('"');
  out
}

fn quote_powershell(value: &str) -> String {
  let mut out = String::with_capacity(value.len() + 2);
  out.push('"');
  for c in value.chars() {
    if matches!(c, '"' | '`') {
      out.push('`');
    }
    out.push(c);
  }
  out.push('"');
  out
}

/// Render the activation script for `env`.
///
/// Variables are exported in key order. `PATH` is prepended once per selected
/// package in selection order, so the last selected package is searched first,
/// matching variable precedence.
pub fn render(env: &EnvironmentDescriptor, shell: Shell) -> String {
  let mut lines = Vec::new();

  if let Some(header) = shell.header() {
    lines.push(header.to_string());
  }
  lines.push(shell.comment(&format!(
    "pinenv environment for {} ({} packages)",
    env.platform,
    env.packages.len()
  )));

  for (name, value) in &env.variables {
    lines.push(shell.export_var(name, value));
  }

  for dir in env.bin_dirs() {
    lines.push(shell.prepend_path("PATH", &dir.display().to_string()));
  }

  let mut script = lines.join("\n");
  script.push('\n');
  script
}
