//! Telemetry module
//!
//! Structured logging and Prometheus metrics

mod logging;
mod metrics;

pub use logging::{init_logging, LogFormat};
pub use self::metrics::{
    increment, increment_by, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric,
};

use crate::config::TelemetryConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Initialize logging and, when a port is configured, the metrics exporter
///
/// Must run inside a tokio runtime: the exporter serves from a spawned task.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.log_level, config.log_format.into())?;

    if let Some(port) = config.metrics_port {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    Ok(())
}
