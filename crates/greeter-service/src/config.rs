//! Greeter service configuration.
//!
//! Configuration is loaded from environment variables. Telemetry settings
//! (service name, OTLP endpoint, export interval, sampling) are delegated to
//! [`common::config::ObservabilityConfig`].

use common::config::{ConfigError as ObservabilityConfigError, ObservabilityConfig};
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default graceful-shutdown drain period in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 0;

/// Greeter service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: SocketAddr,

    /// Seconds to keep draining connections after a shutdown signal.
    pub drain_seconds: u64,

    /// Telemetry export settings.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid drain period: {0}")]
    InvalidDrainSeconds(String),

    #[error(transparent)]
    Observability(#[from] ObservabilityConfigError),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address_str = vars
            .get("BIND_ADDRESS")
            .map(String::as_str)
            .unwrap_or(DEFAULT_BIND_ADDRESS);

        let bind_address: SocketAddr = bind_address_str.parse().map_err(|e| {
            ConfigError::InvalidBindAddress(format!(
                "BIND_ADDRESS must be host:port, got '{}': {}",
                bind_address_str, e
            ))
        })?;

        let drain_seconds = if let Some(value_str) = vars.get("GREETER_DRAIN_SECONDS") {
            value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainSeconds(format!(
                    "GREETER_DRAIN_SECONDS must be a non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?
        } else {
            DEFAULT_DRAIN_SECONDS
        };

        let observability = ObservabilityConfig::from_vars(vars)?;

        Ok(Config {
            bind_address,
            drain_seconds,
            observability,
        })
    }
}
