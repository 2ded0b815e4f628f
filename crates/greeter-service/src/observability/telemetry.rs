//! Telemetry bootstrap: `tracing` subscriber plus OTLP pipelines.
//!
//! One call to [`init_telemetry`] installs, for the whole process:
//!
//! - a console `fmt` layer (plain or JSON) behind an `EnvFilter`,
//! - a `tracing-opentelemetry` layer turning spans into OTLP traces,
//! - an `opentelemetry-appender-tracing` bridge turning events into OTLP logs,
//! - a global meter provider with a periodic OTLP metric reader.
//!
//! All three exporters use gRPC against the same collector endpoint and share
//! one `service.name` resource. When the endpoint is `None` only the console
//! layer is installed.

use crate::observability::metrics::DurationAggregationSelector;
use common::config::ObservabilityConfig;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::logs::LoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{self as sdktrace, Sampler, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to install OTLP trace pipeline: {0}")]
    Traces(#[from] opentelemetry::trace::TraceError),

    #[error("Failed to install OTLP metrics pipeline: {0}")]
    Metrics(#[from] opentelemetry::metrics::MetricsError),

    #[error("Failed to install OTLP log pipeline: {0}")]
    Logs(#[from] opentelemetry::logs::LogError),

    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(String),
}

/// Owns the OTLP providers for the lifetime of the process.
///
/// Dropping the guard (or calling [`TelemetryGuard::shutdown`]) flushes
/// pending batches. Keep it alive in `main` until the server has stopped.
#[must_use = "dropping the guard shuts down telemetry export"]
pub struct TelemetryGuard {
    tracer_provider: Option<TracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
    logger_provider: Option<LoggerProvider>,
}

impl std::fmt::Debug for TelemetryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGuard")
            .field("otlp_enabled", &self.is_exporting())
            .finish()
    }
}

impl TelemetryGuard {
    /// Whether OTLP pipelines were installed.
    pub fn is_exporting(&self) -> bool {
        self.tracer_provider.is_some()
    }

    /// Flush and shut down every provider. Idempotent.
    pub fn shutdown(&mut self) {
        if self.tracer_provider.take().is_some() {
            global::shutdown_tracer_provider();
        }

        if let Some(meter_provider) = self.meter_provider.take() {
            if let Err(e) = meter_provider.shutdown() {
                warn!(error = %e, "Meter provider shutdown failed");
            }
        }

        if let Some(logger_provider) = self.logger_provider.take() {
            if let Err(e) = logger_provider.shutdown() {
                warn!(error = %e, "Logger provider shutdown failed");
            }
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Install the process-wide subscriber and, if configured, the OTLP pipelines.
///
/// Must run inside a tokio runtime: batch processors and the periodic metric
/// reader spawn onto it.
///
/// # Errors
///
/// Returns an error if a pipeline fails to build, the filter directive is
/// invalid, or a global subscriber is already installed.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<TelemetryGuard, TelemetryError> {
    let filter = EnvFilter::try_new(&config.log_filter).map_err(|e| {
        TelemetryError::InvalidFilter {
            filter: config.log_filter.clone(),
            message: e.to_string(),
        }
    })?;

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    let Some(endpoint) = config.otlp_endpoint.as_deref() else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;

        info!("OTLP export disabled, logging to console only");

        return Ok(TelemetryGuard {
            tracer_provider: None,
            meter_provider: None,
            logger_provider: None,
        });
    };

    let resource = service_resource(&config.service_name);

    let tracer_provider = install_tracer_provider(endpoint, config, resource.clone())?;
    let meter_provider = install_meter_provider(endpoint, config, resource.clone())?;
    let logger_provider = install_logger_provider(endpoint, resource)?;

    let tracer = tracer_provider.tracer(config.service_name.clone());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(OpenTelemetryTracingBridge::new(&logger_provider))
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;

    info!(
        service_name = %config.service_name,
        otlp_endpoint = %endpoint,
        metric_export_interval_ms = config.metric_export_interval.as_millis() as u64,
        sampling_probability = config.sampling_probability,
        "OTLP telemetry export initialized"
    );

    Ok(TelemetryGuard {
        tracer_provider: Some(tracer_provider),
        meter_provider: Some(meter_provider),
        logger_provider: Some(logger_provider),
    })
}

/// Resource shared by all three signals.
fn service_resource(service_name: &str) -> Resource {
    Resource::new(vec![KeyValue::new("service.name", service_name.to_string())])
}

/// Parent-based sampling so downstream spans follow the caller's decision.
fn sampler(probability: f64) -> Sampler {
    Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(probability)))
}

fn install_tracer_provider(
    endpoint: &str,
    config: &ObservabilityConfig,
    resource: Resource,
) -> Result<TracerProvider, TelemetryError> {
    let tracer_provider = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(
            sdktrace::Config::default()
                .with_sampler(sampler(config.sampling_probability))
                .with_resource(resource),
        )
        .install_batch(runtime::Tokio)?;

    global::set_tracer_provider(tracer_provider.clone());

    Ok(tracer_provider)
}

fn install_meter_provider(
    endpoint: &str,
    config: &ObservabilityConfig,
    resource: Resource,
) -> Result<SdkMeterProvider, TelemetryError> {
    let meter_provider = opentelemetry_otlp::new_pipeline()
        .metrics(runtime::Tokio)
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_resource(resource)
        .with_period(config.metric_export_interval)
        .with_aggregation_selector(DurationAggregationSelector)
        .build()?;

    global::set_meter_provider(meter_provider.clone());

    Ok(meter_provider)
}

fn install_logger_provider(
    endpoint: &str,
    resource: Resource,
) -> Result<LoggerProvider, TelemetryError> {
    let logger_provider = opentelemetry_otlp::new_pipeline()
        .logging()
        .with_resource(resource)
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .install_batch(runtime::Tokio)?;

    Ok(logger_provider)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use opentelemetry::Key;

    #[test]
    fn test_service_resource_carries_service_name() {
        let resource = service_resource("greeter-test");
        let value = resource.get(Key::from_static_str("service.name"));
        assert_eq!(
            value.map(|v| v.as_str().into_owned()).as_deref(),
            Some("greeter-test")
        );
    }

    #[test]
    fn test_invalid_filter_rejected_before_install() {
        let config = ObservabilityConfig {
            log_filter: "greeter_service=[".to_string(),
            otlp_endpoint: None,
            ..ObservabilityConfig::default()
        };

        let err = init_telemetry(&config).unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidFilter { .. }));
    }
}
