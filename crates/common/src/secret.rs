//! Secret types for credentials that must never reach a log line.
//!
//! Re-exports [`secrecy`]'s wrappers. Anything that authenticates against the
//! observability backend goes through these: the admin password used to
//! provision a service account, and the service-account key used as a bearer
//! token for queries.
//!
//! `SecretString` implements `Debug` with redaction, so a struct deriving
//! `Debug` that holds one is safe to pass to `tracing` fields or `{:?}`.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct AdminLogin {
//!     username: String,
//!     password: SecretString,
//! }
//!
//! let login = AdminLogin {
//!     username: "admin".to_string(),
//!     password: SecretString::from("admin"),
//! };
//!
//! assert!(!format!("{login:?}").contains("password: \"admin\""));
//! assert_eq!(login.password.expose_secret(), "admin");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

/// Build an `Authorization` header value for a bearer token.
///
/// The returned string contains the raw token; hand it straight to the HTTP
/// client and do not log it.
pub fn bearer_header(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret())
}
