//! Redaction of credentials in backend error bodies.
//!
//! Grafana echoes request details in some error responses, and the harness
//! surfaces those bodies in assertion failures. Anything token-shaped is
//! redacted before it reaches an error message.

use regex::Regex;
use std::sync::LazyLock;

/// Maximum length for error body in error messages.
pub const MAX_ERROR_BODY_LEN: usize = 256;

/// Regex pattern for Bearer tokens in text.
static BEARER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)bearer\s+[A-Za-z0-9_\-.=]+").unwrap());

/// Regex pattern for Basic credentials in text.
static BASIC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)basic\s+[A-Za-z0-9+/=]{8,}").unwrap());

/// Regex pattern for Grafana service account keys (`glsa_...`).
static SERVICE_ACCOUNT_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"glsa_[A-Za-z0-9_]+").unwrap());

/// Sanitize error response body to remove sensitive data.
///
/// Bearer and Basic credentials are replaced first so the scheme and value
/// are redacted as a whole, then standalone service account keys. Long
/// bodies are truncated to [`MAX_ERROR_BODY_LEN`] bytes on a char boundary.
pub fn sanitize_error_body(body: &str) -> String {
    let sanitized = BEARER_PATTERN.replace_all(body, "[BEARER_REDACTED]");
    let sanitized = BASIC_PATTERN.replace_all(&sanitized, "[BASIC_REDACTED]");
    let sanitized = SERVICE_ACCOUNT_KEY_PATTERN.replace_all(&sanitized, "[KEY_REDACTED]");

    if sanitized.len() > MAX_ERROR_BODY_LEN {
        let mut end = MAX_ERROR_BODY_LEN;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", &sanitized[..end])
    } else {
        sanitized.into_owned()
    }
}
