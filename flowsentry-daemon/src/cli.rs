//! CLI argument definitions for flowsentry-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Flowsentry telemetry enrichment daemon.
///
/// Reads flat telemetry records, evaluates them against the compiled
/// policy set, and writes enriched records downstream.
#[derive(Parser, Debug)]
#[command(name = "flowsentry-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to flowsentry.toml configuration file.
    #[arg(short, long, default_value = "/etc/flowsentry/flowsentry.toml")]
    pub config: PathBuf,

    /// Read records from this JSON-lines trace file instead of stdin.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Override the policy directory from the config file.
    #[arg(long)]
    pub policies: Option<PathBuf>,

    /// Override the engine mode (alert, enrich).
    #[arg(long)]
    pub mode: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and policies, then exit.
    #[arg(long)]
    pub validate: bool,
}
