//! Liveness handler.

/// Liveness probe handler.
///
/// Returns "OK" while the process is serving requests. Checks no
/// dependencies; an unreachable collector must not take the service down.
pub async fn health_check() -> &'static str {
    "OK"
}
