// src/cli.rs

//! CLI argument parsing using `clap`.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::duration::parse_duration;
use crate::types::{Operation, Scope};

/// Command-line arguments for `robomon`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "robomon",
    version,
    about = "Run robocopy and follow its progress, summary and exit status.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// If omitted, `Robomon.toml` is read when it exists.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Source directory. Overrides `[job].source`.
    #[arg(long, value_name = "PATH")]
    pub source: Option<String>,

    /// Destination directory. Overrides `[job].destination`.
    #[arg(long, value_name = "PATH")]
    pub destination: Option<String>,

    /// `copy` or `move`.
    #[arg(long, value_name = "OP")]
    pub operation: Option<Operation>,

    /// `all` or `latest` (only the most recently modified file).
    #[arg(long, value_name = "SCOPE")]
    pub scope: Option<Scope>,

    /// Executable to launch instead of `robocopy`.
    #[arg(long, value_name = "PROGRAM")]
    pub program: Option<String>,

    /// Cancel the run after this long, e.g. `30m`.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ROBOMON_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the resolved command line, but don't start it.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the post-run log analysis.
    #[arg(long)]
    pub no_analyze: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
