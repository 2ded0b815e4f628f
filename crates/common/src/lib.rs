//! Common utilities and types shared across the greeter workspace.

#![warn(clippy::pedantic)]

/// Module for observability configuration
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;
