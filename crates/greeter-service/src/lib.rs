//! Greeter Service Library
//!
//! A single greeting endpoint instrumented end to end: every request yields a
//! server span, a request-duration histogram sample and (for `/greetings`) a
//! structured log event, all exported over OTLP to an observability backend.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/http_metrics.rs -> handlers/*.rs
//!                                  |
//!                   observability/{metrics,telemetry}.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `handlers` - HTTP request handlers
//! - `middleware` - Request metrics middleware
//! - `observability` - OTLP pipelines and metric instruments
//! - `routes` - Axum router setup

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
