mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use pinenv_lib::activation::Shell;
use pinenv_lib::platform::Platform;
use tracing_subscriber::EnvFilter;

use crate::cmd::{ResolveArgs, cmd_env, cmd_info, cmd_inputs, cmd_lock, cmd_resolve};
use crate::output::{OutputFormat, print_error};

/// pinenv - hermetic per-platform environment resolver
#[derive(Parser)]
#[command(name = "pinenv")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Resolve the environment for every configured platform
  Resolve {
    /// Path to the config file (default: ./pinenv.json, then the user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Platform to resolve; repeatable (default: the config's platforms)
    #[arg(short, long = "platform")]
    platforms: Vec<Platform>,

    /// Stop starting platforms once one fails, and exit nonzero
    #[arg(long)]
    fail_fast: bool,

    /// Number of platforms resolved in parallel
    #[arg(short, long, env = "PINENV_JOBS")]
    jobs: Option<usize>,

    /// Cancel platforms that have not started after this long (e.g. "30s")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Do not write the lock file
    #[arg(long)]
    frozen: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Print the activation script for one platform
  Env {
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Platform to resolve (default: the current platform)
    #[arg(short, long)]
    platform: Option<Platform>,

    /// Shell to render for (default: detected from $SHELL)
    #[arg(short, long)]
    shell: Option<Shell>,

    /// Output format; json prints the environment descriptor
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Pin inputs and write pinenv.lock
  Lock {
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Inputs to re-pin even if already locked
    inputs: Vec<String>,

    /// Re-pin every input
    #[arg(long, conflicts_with = "inputs")]
    all: bool,

    /// Show what would change without writing
    #[arg(long)]
    dry_run: bool,
  },

  /// Show inputs, their alias chains, and their pins
  Inputs {
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Show platform and store information
  Info,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Resolve {
      config,
      platforms,
      fail_fast,
      jobs,
      timeout,
      frozen,
      output,
    } => cmd_resolve(ResolveArgs {
      config,
      platforms,
      fail_fast,
      jobs,
      timeout,
      frozen,
      output,
    }),
    Commands::Env {
      config,
      platform,
      shell,
      output,
    } => cmd_env(config.as_deref(), platform, shell, output).map(|_| ExitCode::SUCCESS),
    Commands::Lock {
      config,
      inputs,
      all,
      dry_run,
    } => cmd_lock(config.as_deref(), inputs, all, dry_run).map(|_| ExitCode::SUCCESS),
    Commands::Inputs { config, output } => cmd_inputs(config.as_deref(), output),
    Commands::Info => cmd_info().map(|_| ExitCode::SUCCESS),
  };

  match result {
    Ok(code) => code,
    Err(err) => {
      print_error(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}
