//! Greeting handler.

use tracing::info;

/// Fixed greeting returned by `GET /greetings`.
pub const GREETING: &str = "Hello, World!";

/// Message of the log event emitted for every greeting.
pub const GREETING_LOG_MESSAGE: &str = "request...";

/// `GET /greetings`
///
/// Emits one INFO event carrying the structured attribute `foo=bar`. The
/// event is recorded inside the request span, so it is exported as an OTLP
/// log record correlated with the request's trace.
///
/// No span is opened here: the request span from `TraceLayer` stays the only
/// span of the trace.
pub async fn greetings() -> &'static str {
    info!(foo = "bar", "{}", GREETING_LOG_MESSAGE);
    GREETING
}
