//! Implementation of the `pinenv resolve` command.
//!
//! Resolves every requested platform and prints a per-platform summary. The
//! exit code is nonzero only when fail-fast was requested and a platform failed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;
use tracing::warn;

use pinenv_lib::compose::EnvironmentDescriptor;
use pinenv_lib::engine::{Engine, EngineReport, LockMode};
use pinenv_lib::matrix::{Cancellation, MatrixOptions, PlatformOutcome};
use pinenv_lib::platform::Platform;

use super::load_config;
use crate::output::{OutputFormat, format_duration, print_json, symbols};

pub struct ResolveArgs {
  pub config: Option<PathBuf>,
  pub platforms: Vec<Platform>,
  pub fail_fast: bool,
  pub jobs: Option<usize>,
  pub timeout: Option<Duration>,
  pub frozen: bool,
  pub output: OutputFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveOutput<'a> {
  fail_fast: bool,
  platforms: Vec<PlatformOutput<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
enum PlatformStatus<'a> {
  Ok { environment: &'a EnvironmentDescriptor },
  Error { error: String },
  Cancelled,
}

#[derive(Debug, Serialize)]
struct PlatformOutput<'a> {
  platform: Platform,
  #[serde(flatten)]
  status: PlatformStatus<'a>,
}

pub fn cmd_resolve(args: ResolveArgs) -> Result<ExitCode> {
  let start = Instant::now();
  let (config, config_dir) = load_config(args.config.as_deref())?;

  let lock_mode = if args.frozen { LockMode::ReadOnly } else { LockMode::Write };
  let engine = Engine::from_config(&config, &config_dir, lock_mode).context("Failed to prepare resolution")?;

  let platforms = if args.platforms.is_empty() {
    config.platforms()
  } else {
    args.platforms
  };

  let options = MatrixOptions {
    fail_fast: args.fail_fast || config.fail_fast,
    parallelism: args.jobs,
  };

  let cancel = Cancellation::new();
  if let Some(timeout) = args.timeout {
    let cancel = cancel.clone();
    thread::spawn(move || {
      thread::sleep(timeout);
      warn!(timeout = %humantime::format_duration(timeout), "timeout reached, cancelling pending platforms");
      cancel.cancel_all();
    });
  }

  let report = engine.run(&platforms, &options, &cancel).context("Resolution failed")?;

  if args.output.is_json() {
    print_json(&to_output(&report))?;
  } else {
    print_summary(&report, start.elapsed());
  }

  Ok(if report.is_fatal() {
    ExitCode::FAILURE
  } else {
    ExitCode::SUCCESS
  })
}

fn to_output(report: &EngineReport) -> ResolveOutput<'_> {
  ResolveOutput {
    fail_fast: report.fail_fast,
    platforms: report
      .results
      .iter()
      .map(|(platform, outcome)| PlatformOutput {
        platform: *platform,
        status: match outcome {
          PlatformOutcome::Ok(env) => PlatformStatus::Ok { environment: env },
          PlatformOutcome::Err(err) => PlatformStatus::Error { error: err.to_string() },
          PlatformOutcome::Cancelled => PlatformStatus::Cancelled,
        },
      })
      .collect(),
  }
}

fn print_summary(report: &EngineReport, elapsed: Duration) {
  for (platform, outcome) in &report.results {
    match outcome {
      PlatformOutcome::Ok(env) => {
        let packages: Vec<String> = env.packages.iter().map(|p| p.label()).collect();
        println!(
          "{} {} {}",
          symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
          platform.if_supports_color(Stream::Stdout, |s| s.cyan()),
          format!(
            "({} package(s), {} variable(s))",
            env.packages.len(),
            env.variables.len()
          )
          .if_supports_color(Stream::Stdout, |s| s.dimmed())
        );
        if !packages.is_empty() {
          println!("    {}", packages.join(", "));
        }
      }
      PlatformOutcome::Err(err) => {
        println!(
          "{} {} {}",
          symbols::ERROR.if_supports_color(Stream::Stdout, |s| s.red()),
          platform.if_supports_color(Stream::Stdout, |s| s.cyan()),
          err.if_supports_color(Stream::Stdout, |s| s.red())
        );
      }
      PlatformOutcome::Cancelled => {
        println!(
          "{} {} {}",
          symbols::SKIPPED.if_supports_color(Stream::Stdout, |s| s.dimmed()),
          platform.if_supports_color(Stream::Stdout, |s| s.cyan()),
          "cancelled".if_supports_color(Stream::Stdout, |s| s.dimmed())
        );
      }
    }
  }

  let ok = report.successes().count();
  println!();
  println!(
    "Resolved {} of {} platform(s) in {}",
    ok,
    report.results.len(),
    format_duration(elapsed)
  );
}
