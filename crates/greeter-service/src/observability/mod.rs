//! Observability for the greeter service.
//!
//! Provides the OTLP bootstrap, metric instruments and request spans.

pub mod metrics;
pub mod spans;
pub mod telemetry;

pub use metrics::HttpMetrics;
pub use telemetry::{init_telemetry, TelemetryError, TelemetryGuard};
