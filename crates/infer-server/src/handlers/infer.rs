//! Start handler.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::{
    error::ServerError,
    models::{InferRequest, InferResponse},
    state::AppState,
};

/// Start a generation job and return immediately.
///
/// Malformed bodies and invalid configs are rejected with 400 before any state
/// changes, as is a start while another job is generating or the engine is
/// still loading. The job itself runs on the background worker.
pub async fn handle_infer(
    State(state): State<AppState>,
    payload: Result<Json<InferRequest>, JsonRejection>,
) -> Result<Json<InferResponse>, ServerError> {
    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "malformed start request");
        ServerError::InvalidRequest(rejection.body_text())
    })?;

    let mut config = req.config;
    config
        .validate()
        .map_err(|err| ServerError::InvalidRequest(err.to_string()))?;

    let limit = state.config.max_new_tokens;
    if config.max_new_tokens > limit {
        tracing::debug!(
            requested = config.max_new_tokens,
            limit,
            "clamping max_new_tokens"
        );
        config.max_new_tokens = limit;
    }

    let ticket = state.jobs.begin_generation()?;
    tracing::info!(
        job = ticket.sequence(),
        prompt_chars = req.prompt.len(),
        max_new_tokens = config.max_new_tokens,
        "generation started"
    );

    state
        .worker()
        .spawn(ticket, req.prompt, config, state.config.job_timeout);

    Ok(Json(InferResponse {}))
}
