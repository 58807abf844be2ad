//! HTTP error handling and response mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::job::JobStatus;

/// Rejected job lifecycle operations. Both are client errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("cannot start generation while status is {0}")]
    InvalidStateTransition(JobStatus),

    #[error("generated text is not ready (status is {0})")]
    NotReady(JobStatus),
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (code, status) = match self {
            ServerError::Job(JobError::InvalidStateTransition(status)) => {
                ("invalid_state_transition", Some(status))
            }
            ServerError::Job(JobError::NotReady(status)) => ("not_ready", Some(status)),
            ServerError::InvalidRequest(_) => ("invalid_request", None),
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": "invalid_request_error",
                "code": code,
                "status": status,
            }
        }));

        (StatusCode::BAD_REQUEST, body).into_response()
    }
}
