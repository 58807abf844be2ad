//! Health check handler.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// Handle health check requests. Includes the job status and the last
/// generation's metrics.
pub async fn handle_health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.engine.model_name(),
        "job": state.jobs.summary(),
        "last_generation": state.telemetry.last_metrics(),
    }))
}
