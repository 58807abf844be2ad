//! Result retrieval handler.

use axum::{extract::State, Json};

use crate::{error::ServerError, models::GeneratedResponse, state::AppState};

/// Claim the finished text. Succeeds once per completed job; the job slot
/// returns to `ready` afterwards.
pub async fn handle_get_generated(
    State(state): State<AppState>,
) -> Result<Json<GeneratedResponse>, ServerError> {
    let text = state.jobs.consume_result()?;
    tracing::info!(chars = text.len(), "generated text claimed");
    Ok(Json(GeneratedResponse { text }))
}
