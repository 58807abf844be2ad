//! Poll handler.

use axum::{extract::State, Json};

use crate::{models::StatusResponse, state::AppState};

/// Return a consistent snapshot of the job state. Never fails.
pub async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.jobs.snapshot();
    tracing::trace!(status = %snapshot.status(), "status polled");
    Json(snapshot)
}
