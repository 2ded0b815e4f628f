//! Telemetry Verification Harness
//!
//! This crate checks, end to end, that the greeter service's metrics, traces
//! and logs reach an observability backend and become queryable. The backend
//! is an ephemeral Grafana LGTM bundle (Grafana in front of Prometheus, Tempo
//! and Loki, fed by an OpenTelemetry collector) started outside the tests.
//!
//! # Features
//!
//! - `smoke`: Backend health and credential provisioning (seconds)
//! - `observability`: Metric, trace and log round trips (~1min)
//! - `all`: Enable all test categories
//!
//! # Prerequisites
//!
//! 1. Backend running: `docker compose -f infra/docker-compose.yml up -d`
//! 2. Ports reachable: Grafana (3000), OTLP gRPC (4317)
//!
//! # Usage
//!
//! ```bash
//! # From repo root - runs 0 env-tests (no default features)
//! cargo test
//!
//! # Smoke tests only
//! cargo test -p env-tests --features smoke
//!
//! # Full suite
//! cargo test -p env-tests --features all
//! ```

pub mod backend;
pub mod config;
pub mod eventual;
pub mod fixtures;
pub mod harness;
pub mod queries;
pub mod sanitize;
