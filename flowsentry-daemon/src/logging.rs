//! Tracing setup for the flowsentry daemon.
//!
//! The daemon logs through `tracing`; this module turns the `[general]`
//! section of `flowsentry.toml` into an installed global subscriber.
//! `RUST_LOG` always wins over the configured level so operators can
//! raise verbosity per module without editing the config file.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use flowsentry_core::config::GeneralConfig;

/// Log output format selected by `general.log_format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    /// One JSON object per line, for collectors.
    Json,
    /// Multi-line human-readable output, for development.
    Pretty,
}

impl LogFormat {
    fn from_config(raw: &str) -> Result<Self> {
        match raw {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!(
                "log_format '{other}' is not supported; use 'json' or 'pretty'"
            )),
        }
    }
}

/// Install the global tracing subscriber for this process.
///
/// Call once, before the engine or any driver emits events. A second
/// call fails because the global subscriber slot is already taken.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format = LogFormat::from_config(&config.log_format)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("global tracing subscriber already set: {e}"))
}
