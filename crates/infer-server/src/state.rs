//! Application state and configuration.

use std::sync::Arc;
use std::time::Duration;

use infer_engine::GenerationEngine;
use infer_runtime::LogTelemetry;

use crate::job::JobManager;
use crate::worker::GenerationWorker;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Engine driven by the background worker.
    pub engine: Arc<dyn GenerationEngine>,
    /// The single job slot.
    pub jobs: Arc<JobManager>,
    /// Server configuration.
    pub config: ServerConfig,
    /// Metrics of the most recent generation.
    pub telemetry: LogTelemetry,
}

/// Server configuration parameters.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Upper bound on `max_new_tokens`; larger requests are clamped.
    pub max_new_tokens: usize,
    /// Stop a job that runs longer than this.
    pub job_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 2000,
            job_timeout: None,
        }
    }
}

impl AppState {
    pub fn new(engine: Arc<dyn GenerationEngine>, config: ServerConfig) -> Self {
        Self::with_jobs(engine, Arc::new(JobManager::new()), config)
    }

    /// Use an existing job manager, e.g. one created in `Loading` state at startup.
    pub fn with_jobs(
        engine: Arc<dyn GenerationEngine>,
        jobs: Arc<JobManager>,
        config: ServerConfig,
    ) -> Self {
        Self {
            engine,
            jobs,
            config,
            telemetry: LogTelemetry::new(),
        }
    }

    pub fn worker(&self) -> GenerationWorker {
        GenerationWorker::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.jobs),
            self.telemetry.clone(),
        )
    }
}
