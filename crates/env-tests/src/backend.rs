//! Backend connection and health check utilities.
//!
//! This module provides the `BackendConnection` type for validating that the
//! observability backend (Grafana in front of Prometheus, Tempo and Loki, fed
//! by an OTLP collector) is up before running tests. Its lifecycle is managed
//! outside the test process, e.g. `docker compose -f infra/docker-compose.yml up`.

use crate::config::{HarnessConfig, HarnessConfigError};
use crate::eventual::{assert_eventually, EventualError, Observed, PollPolicy};
use crate::fixtures::grafana::{GrafanaClient, QueryError};
use crate::fixtures::provisioner::{AccessToken, AdminCredentials, CredentialProvisioner};
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

/// Backend connection errors.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend not reachable at {endpoint}. Run 'docker compose -f infra/docker-compose.yml up -d' to start it")]
    NotReachable { endpoint: String },

    #[error("Invalid backend URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error(transparent)]
    Config(#[from] HarnessConfigError),

    #[error("Backend health check failed: {0}")]
    HealthCheckFailed(#[from] QueryError),

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Connection to the observability backend.
///
/// Holds base URLs and a shared HTTP client. Cheap to build per test.
pub struct BackendConnection {
    pub grafana_url: String,
    pub otlp_endpoint: String,
    admin: AdminCredentials,
    poll_policy: PollPolicy,
    http_client: reqwest::Client,
}

impl BackendConnection {
    /// Connect using configuration from the environment, verifying that both
    /// Grafana and the OTLP collector accept TCP connections.
    pub async fn new() -> Result<Self, BackendError> {
        Self::connect(HarnessConfig::from_env()?).await
    }

    /// Connect with explicit configuration, verifying TCP reachability.
    pub async fn connect(config: HarnessConfig) -> Result<Self, BackendError> {
        check_tcp_endpoint(&config.grafana_url).await?;
        check_tcp_endpoint(&config.otlp_endpoint).await?;
        Self::from_config(config)
    }

    /// Build a connection without probing the backend.
    pub fn from_config(config: HarnessConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(BackendError::HttpClient)?;

        Ok(Self {
            grafana_url: config.grafana_url.trim_end_matches('/').to_string(),
            otlp_endpoint: config.otlp_endpoint,
            admin: config.admin,
            poll_policy: config.poll_policy,
            http_client,
        })
    }

    /// Get the HTTP client for making requests.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Polling policy for telemetry assertions against this backend.
    pub fn poll_policy(&self) -> PollPolicy {
        self.poll_policy
    }

    /// Check that Grafana's health endpoint responds with success.
    pub async fn check_grafana(&self) -> Result<(), BackendError> {
        GrafanaClient::with_client(&self.grafana_url, self.http_client.clone())
            .check_health()
            .await?;
        Ok(())
    }

    /// Wait until Grafana reports healthy.
    ///
    /// The bundled backend opens its ports well before Grafana finishes
    /// provisioning datasources.
    pub async fn wait_until_ready(&self, policy: PollPolicy) -> Result<Observed<()>, EventualError> {
        assert_eventually("grafana health", policy, || self.check_grafana()).await
    }

    /// Credential provisioner using the configured admin login.
    pub fn provisioner(&self) -> CredentialProvisioner {
        CredentialProvisioner::with_client(
            &self.grafana_url,
            self.admin.clone(),
            self.http_client.clone(),
        )
    }

    /// Query client authenticated with `token`.
    pub fn query_client(&self, token: &AccessToken) -> GrafanaClient {
        GrafanaClient::with_client(&self.grafana_url, self.http_client.clone()).with_token(token)
    }
}

/// Check that `url`'s host and port accept a TCP connection within 5s.
async fn check_tcp_endpoint(url: &str) -> Result<(), BackendError> {
    let parsed = Url::parse(url).map_err(|e| BackendError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let host = parsed.host_str().ok_or_else(|| BackendError::InvalidUrl {
        url: url.to_string(),
        message: "missing host".to_string(),
    })?;

    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| BackendError::InvalidUrl {
            url: url.to_string(),
            message: "missing port".to_string(),
        })?;

    let not_reachable = || BackendError::NotReachable {
        endpoint: format!("{}:{}", host, port),
    };

    tokio::time::timeout(Duration::from_secs(5), TcpStream::connect((host, port)))
        .await
        .map_err(|_| not_reachable())?
        .map_err(|_| not_reachable())?;

    Ok(())
}
