//! # Greeter Test Utilities
//!
//! Shared test utilities for the greeter service.
//!
//! This crate provides:
//! - Server test harness (`TestGreeterServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use greeter_test_utils::TestGreeterServer;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestGreeterServer::spawn().await?;
//!
//!     let response = reqwest::get(format!("{}/greetings", server.url())).await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod server_harness;

// Re-export commonly used items
pub use server_harness::*;
