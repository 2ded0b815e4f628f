//! HTTP server metrics.
//!
//! Instruments follow the OpenTelemetry HTTP semantic conventions so the
//! collector translates them into the Prometheus names dashboards expect:
//!
//! | OTLP instrument | unit | Prometheus series |
//! |-----------------|------|-------------------|
//! | `http.server.request.duration` | `s` | `http_server_request_duration_seconds_{bucket,sum,count}` |
//!
//! # Cardinality
//!
//! - `http.request.method`: 9 known methods, anything else is `_OTHER`
//! - `http.route`: matched route templates only, unmatched paths are `/other`
//! - `http.response.status_code`: bounded by the status codes the router emits
//!
//! # Buckets
//!
//! The SDK's default histogram bounds (0 to 10000) assume milliseconds.
//! [`DurationAggregationSelector`] swaps in [`DURATION_BUCKETS_SECONDS`] for
//! histograms so sub-second requests spread across buckets.

use opentelemetry::metrics::{Histogram, Meter};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::reader::{AggregationSelector, DefaultAggregationSelector};
use opentelemetry_sdk::metrics::{Aggregation, InstrumentKind};
use std::time::Duration;

/// Instrument name of the request-duration histogram.
pub const HTTP_SERVER_REQUEST_DURATION: &str = "http.server.request.duration";

/// Route label for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "/other";

/// Instrumentation scope name for the service's meter.
pub const METER_NAME: &str = "greeter-service";

/// Histogram bucket boundaries for request durations, in seconds.
pub const DURATION_BUCKETS_SECONDS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Aggregation for the service's exporters: seconds-scale buckets for
/// histograms, SDK defaults for everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationAggregationSelector;

impl AggregationSelector for DurationAggregationSelector {
    fn aggregation(&self, kind: InstrumentKind) -> Aggregation {
        match kind {
            InstrumentKind::Histogram => Aggregation::ExplicitBucketHistogram {
                boundaries: DURATION_BUCKETS_SECONDS.to_vec(),
                record_min_max: true,
            },
            other => DefaultAggregationSelector::new().aggregation(other),
        }
    }
}

/// Handle to the HTTP server instruments.
///
/// Built once from a [`Meter`] after the meter provider is installed, then
/// cloned into the router state. Instruments created from the no-op provider
/// stay no-ops, so construct this after telemetry initialization.
#[derive(Clone)]
pub struct HttpMetrics {
    request_duration: Histogram<f64>,
}

impl std::fmt::Debug for HttpMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMetrics").finish_non_exhaustive()
    }
}

impl HttpMetrics {
    /// Create the instruments on the given meter.
    pub fn new(meter: &Meter) -> Self {
        let request_duration = meter
            .f64_histogram(HTTP_SERVER_REQUEST_DURATION)
            .with_unit("s")
            .with_description("Duration of HTTP server requests")
            .init();

        Self { request_duration }
    }

    /// Create the instruments on the globally installed meter provider.
    pub fn from_global() -> Self {
        Self::new(&global::meter(METER_NAME))
    }

    /// Record HTTP request completion.
    ///
    /// `route` is the matched route template (e.g. `/greetings`), `None` when
    /// the router found no match.
    pub fn record_http_request(
        &self,
        method: &str,
        route: Option<&str>,
        status_code: u16,
        duration: Duration,
    ) {
        let attributes = http_request_attributes(method, route, status_code);
        self.request_duration.record(duration.as_secs_f64(), &attributes);
    }
}

/// Attribute set attached to each request-duration sample.
pub fn http_request_attributes(
    method: &str,
    route: Option<&str>,
    status_code: u16,
) -> [KeyValue; 3] {
    [
        KeyValue::new("http.request.method", normalize_method(method)),
        KeyValue::new("http.route", route.unwrap_or(UNMATCHED_ROUTE).to_string()),
        KeyValue::new("http.response.status_code", i64::from(status_code)),
    ]
}

/// Map the request method onto the bounded set from the HTTP conventions.
fn normalize_method(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "CONNECT" => "CONNECT",
        "OPTIONS" => "OPTIONS",
        "TRACE" => "TRACE",
        "PATCH" => "PATCH",
        _ => "_OTHER",
    }
}
