//! Tracing subscriber setup.
//!
//! Logs go to stderr so that stdout stays free for the run report.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{HandlerError, HandlerResult};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "viewgrant=info,warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" | "text" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub format: LogFormat,
    /// Service name stamped on the startup event.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            service_name: "viewgrant-handler".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Environment variables:
    /// - `VIEWGRANT_LOG_FORMAT`: `json` or `pretty` (default: json; unknown values fall back to json)
    /// - `VIEWGRANT_SERVICE_NAME`: service name (default: viewgrant-handler)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            format: std::env::var("VIEWGRANT_LOG_FORMAT")
                .ok()
                .and_then(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
            service_name: std::env::var("VIEWGRANT_SERVICE_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.service_name),
        }
    }
}

/// Install the global subscriber. Call once, before any event is handled.
pub fn init_tracing(config: &TelemetryConfig) -> HandlerResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    result.map_err(|e| HandlerError::Telemetry(e.to_string()))?;

    tracing::info!(
        service_name = %config.service_name,
        format = ?config.format,
        "Telemetry initialized"
    );
    Ok(())
}
