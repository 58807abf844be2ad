//! Request/response types for the job API.

pub mod control;
pub mod infer;

pub use control::{GeneratedResponse, StopResponse};
pub use infer::{InferRequest, InferResponse};

/// `POST /status` returns a snapshot of the job state.
pub type StatusResponse = crate::job::JobSnapshot;
