//! Telemetry module
//!
//! Logging and metrics

mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};

use crate::config::TelemetryConfig;

/// Guard that keeps telemetry alive for the process lifetime
pub struct TelemetryGuard {
    _priv: (),
}

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    init_logging(&config.log_level, config.log_format)?;

    if let Some(port) = config.metrics_port {
        metrics::init_metrics(port)?;
    }

    Ok(TelemetryGuard { _priv: () })
}
