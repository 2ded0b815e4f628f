//! HTTP routes for the greeter service.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::observability::spans::{make_request_span, record_response};
use crate::observability::HttpMetrics;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across middleware.
#[derive(Clone, Debug)]
pub struct AppState {
    /// HTTP server metric instruments.
    pub http_metrics: HttpMetrics,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/greetings` - Fixed greeting, emits a structured log event
/// - `/health` - Liveness probe
/// - HTTP metrics middleware recording every response
/// - TraceLayer opening one server span per request
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/greetings", get(handlers::greetings))
        .route("/health", get(handlers::health_check));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (outermost)
    // 2. TraceLayer - Request span, so metrics and handler events nest inside it
    // 3. http_metrics_middleware - Record duration with the matched route
    routes
        .layer(middleware::from_fn_with_state(state, http_metrics_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_request_span)
                .on_response(record_response),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
