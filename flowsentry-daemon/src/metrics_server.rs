//! Prometheus scrape endpoint for the daemon.
//!
//! Engine and tailer counters are recorded through the `metrics` facade;
//! nothing is collected until a recorder is installed. This module binds
//! the exporter's HTTP listener from the `[metrics]` config section and
//! registers the descriptions for every flowsentry counter.

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;

use flowsentry_core::config::MetricsSettings;

/// Resolve the `[metrics]` section into a concrete socket address.
///
/// Rejects port 0 (an ephemeral port would make scrape configs useless)
/// and listen addresses that are not plain IPs.
fn scrape_addr(config: &MetricsSettings) -> Result<SocketAddr> {
    if config.port == 0 {
        anyhow::bail!("metrics.port 0 would bind an ephemeral port; pick a fixed one");
    }
    let ip: IpAddr = config.listen_addr.parse().with_context(|| {
        format!(
            "metrics.listen_addr '{}' is not an IP address",
            config.listen_addr
        )
    })?;
    Ok(SocketAddr::new(ip, config.port))
}

/// Bind the scrape listener and install the process-wide recorder.
///
/// Call once, before the engine starts consuming records — counters
/// incremented before installation are lost. Returns the bound address.
pub fn serve_metrics(config: &MetricsSettings) -> Result<SocketAddr> {
    let addr = scrape_addr(config)?;
    if addr.ip().is_unspecified() {
        tracing::warn!(%addr, "metrics listener is reachable from every interface");
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("cannot start metrics listener on {addr}"))?;

    flowsentry_core::metrics::describe_all();
    tracing::info!(%addr, "serving Prometheus metrics");
    Ok(addr)
}
