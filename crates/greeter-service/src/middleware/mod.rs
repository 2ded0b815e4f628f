//! Middleware for the greeter service.
//!
//! - `http_metrics` - request-duration histogram for every response

pub mod http_metrics;

pub use http_metrics::http_metrics_middleware;
