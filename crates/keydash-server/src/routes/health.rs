use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}

/// Liveness plus a round trip to the key store. A store failure reports 503.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, store) = match state.service.list_keys().await {
        Ok(_) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach the key store");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };
    let body = json!({
        "status": if status.is_success() { "ok" } else { "degraded" },
        "service": "keydash",
        "version": env!("CARGO_PKG_VERSION"),
        "store": store,
    });
    (status, Json(body))
}
