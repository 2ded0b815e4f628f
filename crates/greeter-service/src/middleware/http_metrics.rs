//! HTTP metrics middleware for capturing all request/response metrics
//!
//! Records one `http.server.request.duration` sample per response, including
//! responses produced by the framework before any handler runs (404 for
//! unknown paths, 405 for wrong methods).

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use std::time::Instant;

use crate::routes::AppState;

/// Middleware that records HTTP request metrics for all responses
///
/// Captures method, matched route template, response status code and
/// duration. Must be installed with `Router::layer` so `MatchedPath` is set
/// by the time it runs.
pub async fn http_metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string());

    let response = next.run(request).await;

    state.http_metrics.record_http_request(
        &method,
        route.as_deref(),
        response.status().as_u16(),
        start.elapsed(),
    );

    response
}
