//! Health check endpoint for container orchestration.
//!
//! Test harnesses poll this until the controller is up before issuing resets.

/// Health check handler.
///
/// Liveness only: answers "OK" as long as the process can serve HTTP.
pub async fn health() -> &'static str {
    "OK"
}
