//! Single-job lifecycle state shared between request handlers and the worker.
//!
//! The server runs at most one generation at a time. [`JobManager`] owns the
//! status, the accumulated text, and the stop flag behind one mutex; every
//! transition is a method that takes and releases that lock, so a check and the
//! mutation it guards always happen in the same critical section.
//!
//! ```text
//! Loading --mark_loaded--> Ready --begin--> Generating --complete--> DoneGenerating
//!                            ^                   |                        |
//!                            |                   +--fail--> Error         |
//!                            +-------------consume_result-----------------+
//! ```
//!
//! `DoneGenerating` and `Error` are also valid predecessors of `begin_generation`.

use std::fmt;
use std::sync::Arc;

use infer_engine::StoppingCriteria;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// The engine is not available yet. Only seen at startup.
    Loading,
    Ready,
    Generating,
    DoneGenerating,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Loading => "loading",
            JobStatus::Ready => "ready",
            JobStatus::Generating => "generating",
            JobStatus::DoneGenerating => "done_generating",
            JobStatus::Error => "error",
        }
    }

    /// Whether a new job may start from this status.
    pub fn is_startable(self) -> bool {
        matches!(
            self,
            JobStatus::Ready | JobStatus::DoneGenerating | JobStatus::Error
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consistent copy of the job state handed to pollers.
///
/// Serializes as `{"status": "...", "body": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "body", rename_all = "snake_case")]
pub enum JobSnapshot {
    Loading {},
    Ready {},
    Generating { text: String },
    DoneGenerating { text: String },
    Error { text: String, error: String },
}

impl JobSnapshot {
    pub fn status(&self) -> JobStatus {
        match self {
            JobSnapshot::Loading {} => JobStatus::Loading,
            JobSnapshot::Ready {} => JobStatus::Ready,
            JobSnapshot::Generating { .. } => JobStatus::Generating,
            JobSnapshot::DoneGenerating { .. } => JobStatus::DoneGenerating,
            JobSnapshot::Error { .. } => JobStatus::Error,
        }
    }

    /// Text accumulated so far, if the status carries any.
    pub fn text(&self) -> Option<&str> {
        match self {
            JobSnapshot::Generating { text }
            | JobSnapshot::DoneGenerating { text }
            | JobSnapshot::Error { text, .. } => Some(text.as_str()),
            JobSnapshot::Loading {} | JobSnapshot::Ready {} => None,
        }
    }
}

/// Status and stop flag read together, as reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub status: JobStatus,
    pub stop_requested: bool,
}

/// Identifies the job a worker was started for.
///
/// Only the worker that holds the current ticket can write text or finish the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTicket(u64);

impl JobTicket {
    pub fn sequence(&self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    text: String,
    error: Option<String>,
    stop_requested: bool,
    sequence: u64,
}

impl JobState {
    fn owns(&self, ticket: JobTicket) -> bool {
        self.sequence == ticket.0 && self.status == JobStatus::Generating
    }
}

#[derive(Debug)]
pub struct JobManager {
    state: Mutex<JobState>,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl JobManager {
    /// A manager ready to accept jobs.
    pub fn new() -> Self {
        Self::with_status(JobStatus::Ready)
    }

    /// A manager that rejects jobs until [`JobManager::mark_loaded`] is called.
    pub fn loading() -> Self {
        Self::with_status(JobStatus::Loading)
    }

    fn with_status(status: JobStatus) -> Self {
        Self {
            state: Mutex::new(JobState {
                status,
                text: String::new(),
                error: None,
                stop_requested: false,
                sequence: 0,
            }),
        }
    }

    /// Leave `Loading`. Returns `false` if the manager was not loading.
    pub fn mark_loaded(&self) -> bool {
        let mut state = self.state.lock();
        if state.status != JobStatus::Loading {
            return false;
        }
        state.status = JobStatus::Ready;
        true
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().status
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.state.lock();
        match state.status {
            JobStatus::Loading => JobSnapshot::Loading {},
            JobStatus::Ready => JobSnapshot::Ready {},
            JobStatus::Generating => JobSnapshot::Generating {
                text: state.text.clone(),
            },
            JobStatus::DoneGenerating => JobSnapshot::DoneGenerating {
                text: state.text.clone(),
            },
            JobStatus::Error => JobSnapshot::Error {
                text: state.text.clone(),
                error: state.error.clone().unwrap_or_default(),
            },
        }
    }

    /// Claim the job slot: validate the current status and switch to
    /// `Generating` in one critical section. Clears text and the stop flag.
    pub fn begin_generation(&self) -> Result<JobTicket, JobError> {
        let mut state = self.state.lock();
        if !state.status.is_startable() {
            tracing::warn!(status = %state.status, "rejected start request");
            return Err(JobError::InvalidStateTransition(state.status));
        }
        if state.status == JobStatus::DoneGenerating {
            tracing::debug!(
                job = state.sequence,
                chars = state.text.len(),
                "discarding unclaimed result"
            );
        }

        state.sequence += 1;
        state.status = JobStatus::Generating;
        state.text.clear();
        state.error = None;
        state.stop_requested = false;
        Ok(JobTicket(state.sequence))
    }

    /// Append a fragment for the job identified by `ticket`.
    ///
    /// Returns `false` (and drops the fragment) if that job is no longer generating.
    pub fn append_fragment(&self, ticket: JobTicket, fragment: &str) -> bool {
        let mut state = self.state.lock();
        if !state.owns(ticket) {
            tracing::debug!(job = ticket.0, "dropping fragment for inactive job");
            return false;
        }
        state.text.push_str(fragment);
        true
    }

    /// Mark the job finished; its text becomes claimable.
    pub fn complete_generation(&self, ticket: JobTicket) -> bool {
        let mut state = self.state.lock();
        if !state.owns(ticket) {
            return false;
        }
        state.status = JobStatus::DoneGenerating;
        true
    }

    /// Mark the job failed. Partial text is kept alongside the message.
    pub fn fail_generation(&self, ticket: JobTicket, message: impl Into<String>) -> bool {
        let mut state = self.state.lock();
        if !state.owns(ticket) {
            return false;
        }
        state.status = JobStatus::Error;
        state.error = Some(message.into());
        true
    }

    /// Take the finished text and return to `Ready`. Succeeds once per job.
    pub fn consume_result(&self) -> Result<String, JobError> {
        let mut state = self.state.lock();
        if state.status != JobStatus::DoneGenerating {
            return Err(JobError::NotReady(state.status));
        }
        state.status = JobStatus::Ready;
        state.error = None;
        Ok(std::mem::take(&mut state.text))
    }

    /// Ask the running job to stop at its next decoding step.
    ///
    /// Always succeeds; a stop with no active job is remembered until the next
    /// job starts, which clears it.
    pub fn request_stop(&self) {
        let mut state = self.state.lock();
        tracing::debug!(status = %state.status, "stop requested");
        state.stop_requested = true;
    }

    /// Stop only if `ticket` is still the generating job.
    pub fn request_stop_for(&self, ticket: JobTicket) -> bool {
        let mut state = self.state.lock();
        if !state.owns(ticket) {
            return false;
        }
        state.stop_requested = true;
        true
    }

    pub fn stop_requested(&self) -> bool {
        self.state.lock().stop_requested
    }

    pub fn summary(&self) -> JobSummary {
        let state = self.state.lock();
        JobSummary {
            status: state.status,
            stop_requested: state.stop_requested,
        }
    }

    /// Stopping predicate handed to the engine.
    pub fn stop_signal(self: &Arc<Self>) -> Arc<dyn StoppingCriteria> {
        Arc::new(UserRequestedStop {
            jobs: Arc::clone(self),
        })
    }
}

/// Reads the stop flag under the job lock on every decoding step.
struct UserRequestedStop {
    jobs: Arc<JobManager>,
}

impl StoppingCriteria for UserRequestedStop {
    fn should_stop(&self) -> bool {
        self.jobs.stop_requested()
    }
}
