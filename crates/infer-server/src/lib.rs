//! # infer-server
//!
//! HTTP front end for a single long-running generation job.
//!
//! A client starts a job with `POST /infer`, polls `POST /status` while the
//! background worker streams fragments into shared state, claims the finished
//! text once with `POST /get_generated`, and may cancel with `POST /stop`.
//! Only one job runs at a time; a second start while one is active is rejected.

pub mod error;
pub mod handlers;
pub mod job;
pub mod models;
pub mod server;
pub mod state;
pub mod worker;

pub use error::{JobError, ServerError};
pub use job::{JobManager, JobSnapshot, JobStatus, JobSummary, JobTicket};
pub use server::{create_router, run_server, serve, serve_with_shutdown};
pub use state::{AppState, ServerConfig};
pub use worker::GenerationWorker;
