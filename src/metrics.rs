// src/metrics.rs
use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;

pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";

/// Install the Prometheus recorder with its own `/metrics` listener when
/// `METRICS_ADDR` is set. Returns the bound address, if any.
pub fn init_from_env() -> Result<Option<SocketAddr>> {
    let Ok(raw) = std::env::var(ENV_METRICS_ADDR) else {
        return Ok(None);
    };
    let addr: SocketAddr = raw
        .parse()
        .with_context(|| format!("{ENV_METRICS_ADDR}={raw} is not a socket address"))?;

    // Use default buckets to avoid API differences across crate versions.
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install recorder")?;

    crate::pipeline::ensure_metrics_described();
    Ok(Some(addr))
}
