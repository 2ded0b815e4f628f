//! Observability configuration shared by the greeter service and its tests.
//!
//! Follows the OpenTelemetry SDK environment variable names so the same
//! settings work for any OTLP-speaking process.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default service name reported as the `service.name` resource attribute.
pub const DEFAULT_SERVICE_NAME: &str = "greeter-service";

/// Default OTLP gRPC endpoint of the collector.
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Default metric export interval in milliseconds.
pub const DEFAULT_METRIC_EXPORT_INTERVAL_MS: u64 = 1000;

/// Default trace sampling probability (sample everything).
pub const DEFAULT_SAMPLING_PROBABILITY: f64 = 1.0;

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "greeter_service=info,tower_http=info";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid metric export interval: {0}")]
    InvalidExportInterval(String),

    #[error("Invalid sampling probability: {0}")]
    InvalidSamplingProbability(String),

    #[error("Invalid boolean value: {0}")]
    InvalidBool(String),
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservabilityConfig {
    /// `service.name` resource attribute attached to every signal.
    pub service_name: String,
    /// OpenTelemetry collector endpoint. `None` disables OTLP export.
    pub otlp_endpoint: Option<String>,
    /// How often the periodic reader pushes metrics.
    pub metric_export_interval: Duration,
    /// Ratio of traces sampled, in `[0.0, 1.0]`.
    pub sampling_probability: f64,
    /// `EnvFilter` directive for the console and OTLP log bridges.
    pub log_filter: String,
    /// Enable JSON-formatted console logs.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            otlp_endpoint: Some(DEFAULT_OTLP_ENDPOINT.to_string()),
            metric_export_interval: Duration::from_millis(DEFAULT_METRIC_EXPORT_INTERVAL_MS),
            sampling_probability: DEFAULT_SAMPLING_PROBABILITY,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let service_name = vars
            .get("OTEL_SERVICE_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());

        let sdk_disabled = match vars.get("OTEL_SDK_DISABLED") {
            Some(value) => parse_bool("OTEL_SDK_DISABLED", value)?,
            None => false,
        };

        let otlp_endpoint = if sdk_disabled {
            None
        } else {
            Some(
                vars.get("OTEL_EXPORTER_OTLP_ENDPOINT")
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_OTLP_ENDPOINT.to_string()),
            )
        };

        let metric_export_interval = if let Some(value_str) = vars.get("OTEL_METRIC_EXPORT_INTERVAL")
        {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidExportInterval(format!(
                    "OTEL_METRIC_EXPORT_INTERVAL must be a positive integer (ms), got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidExportInterval(
                    "OTEL_METRIC_EXPORT_INTERVAL must be greater than 0".to_string(),
                ));
            }

            Duration::from_millis(value)
        } else {
            Duration::from_millis(DEFAULT_METRIC_EXPORT_INTERVAL_MS)
        };

        let sampling_probability = if let Some(value_str) = vars.get("OTEL_TRACES_SAMPLER_ARG") {
            let value: f64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidSamplingProbability(format!(
                    "OTEL_TRACES_SAMPLER_ARG must be a number, got '{}': {}",
                    value_str, e
                ))
            })?;

            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidSamplingProbability(format!(
                    "OTEL_TRACES_SAMPLER_ARG must be within [0, 1], got {}",
                    value
                )));
            }

            value
        } else {
            DEFAULT_SAMPLING_PROBABILITY
        };

        let log_filter = vars
            .get("RUST_LOG")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let json_logs = vars
            .get("LOG_FORMAT")
            .is_some_and(|format| format.eq_ignore_ascii_case("json"));

        Ok(Self {
            service_name,
            otlp_endpoint,
            metric_export_interval,
            sampling_probability,
            log_filter,
            json_logs,
        })
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        other => Err(ConfigError::InvalidBool(format!(
            "{} must be true or false, got '{}'",
            name, other
        ))),
    }
}
