//! Liveness endpoint

/// GET /
pub async fn health() -> &'static str {
    "API is working"
}
