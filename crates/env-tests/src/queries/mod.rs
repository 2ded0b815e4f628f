//! Telemetry query adapters.
//!
//! Each adapter turns a logical expectation ("this route was called", "this
//! trace exists", "this log line was emitted") into a [`TelemetryQuery`]: a
//! backend endpoint path, its query-string parameters and a predicate over
//! the JSON response.
//!
//! Response shapes differ per backend (Prometheus, Tempo, Loki), so each
//! adapter deserializes into its own types. Nothing is shared across adapters
//! beyond the query envelope.

pub mod logs;
pub mod metrics;
pub mod traces;

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub use logs::LogLineExpectation;
pub use metrics::RouteCallCount;
pub use traces::SingleSpanTrace;

/// Telemetry signal a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Metrics,
    Traces,
    Logs,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Metrics => write!(f, "metric"),
            Signal::Traces => write!(f, "trace"),
            Signal::Logs => write!(f, "log"),
        }
    }
}

type Predicate = Box<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A backend query plus the predicate its response must satisfy.
///
/// Immutable once built; one per assertion.
pub struct TelemetryQuery {
    signal: Signal,
    path: String,
    params: BTreeMap<String, String>,
    description: String,
    predicate: Predicate,
}

impl fmt::Debug for TelemetryQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryQuery")
            .field("signal", &self.signal)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl TelemetryQuery {
    /// Build a query.
    ///
    /// `predicate` returns `Err` with a human-readable reason when the
    /// response does not (yet) show the expected telemetry.
    pub fn new<P>(
        signal: Signal,
        path: impl Into<String>,
        params: BTreeMap<String, String>,
        description: impl Into<String>,
        predicate: P,
    ) -> Self
    where
        P: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            signal,
            path: path.into(),
            params,
            description: description.into(),
            predicate: Box::new(predicate),
        }
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// Endpoint path relative to the backend base URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query-string parameters.
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Label used in failure messages, e.g. `metric query <expr>`.
    pub fn label(&self) -> String {
        format!("{} query {}", self.signal, self.description)
    }

    /// Evaluate the predicate against a parsed response body.
    pub fn check(&self, body: &Value) -> Result<(), String> {
        (self.predicate)(body)
    }
}

/// Deserialize a response body into an adapter's own shape.
pub(crate) fn parse<T: serde::de::DeserializeOwned>(body: &Value) -> Result<T, String> {
    T::deserialize(body).map_err(|e| format!("unexpected response shape: {}", e))
}
