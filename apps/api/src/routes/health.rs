use axum::Json;
use serde::Serialize;

use crate::llm_client::MODEL;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub model: &'static str,
}

/// GET /health
/// Liveness only; stores are not checked.
pub async fn health_handler() -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        model: MODEL,
    })
}
