//! Request span construction for `tower_http::trace::TraceLayer`.
//!
//! The span is named `http.request` for console output; `otel.name` renames
//! the exported OTLP span to `"<METHOD> <route>"`, the form trace search and
//! dashboards key on.

use axum::extract::{MatchedPath, Request};
use axum::response::Response;
use std::time::Duration;
use tracing::{debug, field, info_span, Span};

use crate::observability::metrics::UNMATCHED_ROUTE;

/// Name given to the exported server span.
pub fn server_span_name(method: &str, route: Option<&str>) -> String {
    format!("{} {}", method, route.unwrap_or(UNMATCHED_ROUTE))
}

/// `make_span_with` callback: one server span per request.
pub fn make_request_span(request: &Request) -> Span {
    let method = request.method().as_str();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str);

    info_span!(
        "http.request",
        otel.name = %server_span_name(method, route),
        otel.kind = "server",
        http.request.method = %method,
        http.route = %route.unwrap_or(UNMATCHED_ROUTE),
        url.path = %request.uri().path(),
        http.response.status_code = field::Empty,
    )
}

/// `on_response` callback: attach the status code to the request span.
pub fn record_response(response: &Response, latency: Duration, span: &Span) {
    let status = response.status().as_u16();
    span.record("http.response.status_code", status);

    debug!(
        status,
        latency_ms = latency.as_millis() as u64,
        "Request completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_span_name_uses_route_template() {
        assert_eq!(server_span_name("GET", Some("/greetings")), "GET /greetings");
    }

    #[test]
    fn test_server_span_name_for_unmatched_route() {
        assert_eq!(server_span_name("POST", None), "POST /other");
    }
}
