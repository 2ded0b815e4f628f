//! Harness configuration.
//!
//! Where the backend lives and how patiently to wait for telemetry, loaded
//! from environment variables so the same tests run against a local
//! `docker compose` stack or a CI service container.

use crate::eventual::{EventualError, PollPolicy};
use crate::fixtures::provisioner::AdminCredentials;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default Grafana HTTP URL.
pub const DEFAULT_GRAFANA_URL: &str = "http://localhost:3000";

/// Default OTLP gRPC endpoint of the backend's collector.
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Default delay between query attempts in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Default query deadline in milliseconds.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 15000;

#[derive(Debug, Error)]
pub enum HarnessConfigError {
    #[error("Invalid {var}: {message}")]
    InvalidValue { var: &'static str, message: String },

    #[error(transparent)]
    InvalidPolicy(#[from] EventualError),
}

/// Harness configuration.
#[derive(Debug)]
pub struct HarnessConfig {
    /// Grafana base URL (default: "http://localhost:3000").
    pub grafana_url: String,

    /// OTLP endpoint the application under test exports to.
    pub otlp_endpoint: String,

    /// Grafana admin login used for provisioning.
    pub admin: AdminCredentials,

    /// Polling policy for telemetry assertions.
    pub poll_policy: PollPolicy,
}

impl HarnessConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, HarnessConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, HarnessConfigError> {
        let get = |key: &str, default: &str| {
            vars.get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        let interval = parse_millis(vars, "HARNESS_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let timeout = parse_millis(vars, "HARNESS_POLL_TIMEOUT_MS", DEFAULT_POLL_TIMEOUT_MS)?;

        Ok(HarnessConfig {
            grafana_url: get("GRAFANA_URL", DEFAULT_GRAFANA_URL),
            otlp_endpoint: get("OTLP_ENDPOINT", DEFAULT_OTLP_ENDPOINT),
            admin: AdminCredentials::new(
                get("GRAFANA_ADMIN_USER", "admin"),
                get("GRAFANA_ADMIN_PASSWORD", "admin"),
            ),
            poll_policy: PollPolicy::new(interval, timeout)?,
        })
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            grafana_url: DEFAULT_GRAFANA_URL.to_string(),
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            admin: AdminCredentials::default(),
            poll_policy: crate::eventual::ConsistencyCategory::TelemetryExport.policy(),
        }
    }
}

fn parse_millis(
    vars: &HashMap<String, String>,
    var: &'static str,
    default: u64,
) -> Result<Duration, HarnessConfigError> {
    let Some(value_str) = vars.get(var) else {
        return Ok(Duration::from_millis(default));
    };

    value_str
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| HarnessConfigError::InvalidValue {
            var,
            message: format!("expected milliseconds, got '{}': {}", value_str, e),
        })
}
