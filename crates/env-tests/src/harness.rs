//! Telemetry verification harness.
//!
//! Drives one end-to-end check: call the instrumented application, provision
//! a query token on the backend, then wait for the request's metric, trace
//! and log to become queryable.
//!
//! Assertions run sequentially in metric, trace, log order and [`Harness::run`]
//! stops at the first signal that never shows up. [`Harness::observe_all`]
//! skips the trigger and reports every signal's outcome, which is what a
//! negative check ("nothing was emitted") needs.

use crate::backend::BackendConnection;
use crate::eventual::{assert_eventually, EventualError, PollPolicy};
use crate::fixtures::grafana::GrafanaClient;
use crate::fixtures::provisioner::{AccessToken, ProvisioningError, DEFAULT_IDENTITY_NAME};
use crate::queries::{LogLineExpectation, RouteCallCount, Signal, SingleSpanTrace, TelemetryQuery};
use crate::sanitize::sanitize_error_body;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Harness errors.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Application call failed with status {status}: {body}")]
    TriggerFailed { status: u16, body: String },

    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Credential provisioning failed: {0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("{signal} telemetry not observed: {source}")]
    Signal {
        signal: Signal,
        #[source]
        source: EventualError,
    },
}

/// What the application is expected to emit for one request.
#[derive(Debug, Clone)]
pub struct TelemetryExpectations {
    /// Route that is called and that every signal is keyed on.
    pub route: String,
    /// HTTP method of the call; part of the root span name.
    pub method: String,
    /// Structured log attribute key.
    pub log_key: String,
    /// Structured log attribute value.
    pub log_value: String,
    /// Text the log line must contain.
    pub log_message: String,
    /// Expected response body of the call.
    pub response_body: String,
}

impl Default for TelemetryExpectations {
    fn default() -> Self {
        Self {
            route: "/greetings".to_string(),
            method: "GET".to_string(),
            log_key: "foo".to_string(),
            log_value: "bar".to_string(),
            log_message: "request...".to_string(),
            response_body: "Hello, World!".to_string(),
        }
    }
}

impl TelemetryExpectations {
    /// Expected root span name, e.g. `GET /greetings`.
    pub fn root_span_name(&self) -> String {
        format!("{} {}", self.method, self.route)
    }

    /// Metric, trace and log queries for `service_name`, in assertion order.
    pub fn queries(&self, service_name: &str) -> Vec<TelemetryQuery> {
        vec![
            RouteCallCount::new(service_name, &self.route).into_query(),
            SingleSpanTrace::new(service_name, self.root_span_name()).into_query(),
            LogLineExpectation::new(
                service_name,
                &self.log_key,
                &self.log_value,
                &self.log_message,
            )
            .into_query(),
        ]
    }
}

/// One signal that was observed.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalOutcome {
    pub signal: Signal,
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Result of a successful [`Harness::run`].
#[derive(Debug, Clone, Default)]
pub struct HarnessReport {
    pub outcomes: Vec<SignalOutcome>,
}

impl HarnessReport {
    pub fn outcome(&self, signal: Signal) -> Option<&SignalOutcome> {
        self.outcomes.iter().find(|o| o.signal == signal)
    }
}

/// Verification harness bound to a backend and an application endpoint.
pub struct Harness<'a> {
    backend: &'a BackendConnection,
    app_url: String,
    service_name: String,
    identity_name: String,
    expectations: TelemetryExpectations,
    policy: PollPolicy,
}

impl<'a> Harness<'a> {
    /// `app_url` is the application's base URL; `service_name` is the
    /// `service.name` resource its telemetry is exported under.
    pub fn new(
        backend: &'a BackendConnection,
        app_url: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            app_url: app_url.into().trim_end_matches('/').to_string(),
            service_name: service_name.into(),
            identity_name: DEFAULT_IDENTITY_NAME.to_string(),
            expectations: TelemetryExpectations::default(),
            policy: backend.poll_policy(),
        }
    }

    /// Service account name to provision. Must be unique per backend.
    pub fn with_identity_name(mut self, name: impl Into<String>) -> Self {
        self.identity_name = name.into();
        self
    }

    pub fn with_expectations(mut self, expectations: TelemetryExpectations) -> Self {
        self.expectations = expectations;
        self
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Call the application route once and check the response.
    pub async fn trigger(&self) -> Result<(), HarnessError> {
        let url = format!("{}{}", self.app_url, self.expectations.route);
        let method = reqwest::Method::from_bytes(self.expectations.method.as_bytes())
            .map_err(|_| HarnessError::InvalidMethod(self.expectations.method.clone()))?;

        let response = self
            .backend
            .http_client()
            .request(method, &url)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if status != reqwest::StatusCode::OK || body != self.expectations.response_body {
            return Err(HarnessError::TriggerFailed {
                status: status.as_u16(),
                body: sanitize_error_body(&body),
            });
        }

        info!(url = %url, "Triggered application request");
        Ok(())
    }

    /// Provision a query token under the configured identity name.
    pub async fn provision(&self) -> Result<AccessToken, HarnessError> {
        let (_, token) = self
            .backend
            .provisioner()
            .provision(&self.identity_name)
            .await?;
        Ok(token)
    }

    /// Poll `query` until its predicate holds or the policy deadline passes.
    pub async fn assert_signal(
        &self,
        client: &GrafanaClient,
        query: &TelemetryQuery,
    ) -> Result<SignalOutcome, HarnessError> {
        let observed = assert_eventually(&query.label(), self.policy, || client.execute(query))
            .await
            .map_err(|source| HarnessError::Signal {
                signal: query.signal(),
                source,
            })?;

        info!(
            signal = %query.signal(),
            attempts = observed.attempts,
            elapsed = ?observed.elapsed,
            "Telemetry observed"
        );

        Ok(SignalOutcome {
            signal: query.signal(),
            attempts: observed.attempts,
            elapsed: observed.elapsed,
        })
    }

    /// Trigger, provision, then assert metric, trace and log in order.
    ///
    /// Returns the first failure; later signals are not queried.
    pub async fn run(&self) -> Result<HarnessReport, HarnessError> {
        self.trigger().await?;

        let token = self.provision().await?;
        let client = self.backend.query_client(&token);

        let mut report = HarnessReport::default();
        for query in self.expectations.queries(&self.service_name) {
            report.outcomes.push(self.assert_signal(&client, &query).await?);
        }

        Ok(report)
    }

    /// Assert every signal without triggering the application.
    ///
    /// Each signal gets its own full polling window; all outcomes are
    /// returned, in metric, trace, log order.
    pub async fn observe_all(
        &self,
        client: &GrafanaClient,
    ) -> Vec<(Signal, Result<SignalOutcome, HarnessError>)> {
        let mut outcomes = Vec::new();

        for query in self.expectations.queries(&self.service_name) {
            let outcome = self.assert_signal(client, &query).await;
            if let Err(e) = &outcome {
                warn!(signal = %query.signal(), error = %e, "Telemetry not observed");
            }
            outcomes.push((query.signal(), outcome));
        }

        outcomes
    }
}
