use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

/// GET /health
///
/// Reports 503 when the configured store cannot be reached.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let (status, database) = match state.db.verify_connection().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "database": database,
            "backend": state.db.backend_name(),
            "environment": state.config.environment,
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}
