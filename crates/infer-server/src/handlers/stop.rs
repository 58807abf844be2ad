//! Cancellation handler.

use axum::{extract::State, Json};

use crate::{models::StopResponse, state::AppState};

/// Request a cooperative stop. Idempotent; a no-op when nothing is running.
pub async fn handle_stop(State(state): State<AppState>) -> Json<StopResponse> {
    state.jobs.request_stop();
    Json(StopResponse {})
}
