//! Background worker that drains an engine's token stream into the job state.
//!
//! The engine call and the stream are blocking, so the drain runs on tokio's
//! blocking pool. A supervising async task awaits it and turns a panic inside the
//! engine into an `error` status, so no failure can leave the job `generating`.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use infer_engine::{GenerationConfig, GenerationEngine};
use infer_runtime::{GenerationOutcome, GenerationTimer, LogTelemetry};
use tokio::task::JoinHandle;

use crate::job::{JobManager, JobTicket};

#[derive(Clone)]
pub struct GenerationWorker {
    engine: Arc<dyn GenerationEngine>,
    jobs: Arc<JobManager>,
    telemetry: LogTelemetry,
}

impl GenerationWorker {
    pub fn new(
        engine: Arc<dyn GenerationEngine>,
        jobs: Arc<JobManager>,
        telemetry: LogTelemetry,
    ) -> Self {
        Self {
            engine,
            jobs,
            telemetry,
        }
    }

    /// Run the job in the background and return without waiting for it.
    ///
    /// With a `timeout`, a watchdog requests a stop for this job once it elapses.
    pub fn spawn(
        self,
        ticket: JobTicket,
        prompt: String,
        config: GenerationConfig,
        timeout: Option<Duration>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let jobs = Arc::clone(&self.jobs);

            let watchdog = timeout.map(|limit| {
                let jobs = Arc::clone(&jobs);
                tokio::spawn(async move {
                    tokio::time::sleep(limit).await;
                    if jobs.request_stop_for(ticket) {
                        tracing::warn!(
                            job = ticket.sequence(),
                            timeout_ms = limit.as_millis() as u64,
                            "generation timed out, stopping"
                        );
                    }
                })
            });

            let result =
                tokio::task::spawn_blocking(move || self.run(ticket, &prompt, &config)).await;

            if let Some(watchdog) = watchdog {
                watchdog.abort();
            }

            if let Err(err) = result {
                let reason = if err.is_panic() {
                    panic_message(err.into_panic())
                } else {
                    "worker cancelled".to_string()
                };
                tracing::error!(job = ticket.sequence(), %reason, "generation worker aborted");
                jobs.fail_generation(ticket, format!("generation worker aborted: {reason}"));
            }
        })
    }

    /// Drive the engine to completion and record the terminal status. Blocking.
    pub fn run(&self, ticket: JobTicket, prompt: &str, config: &GenerationConfig) {
        let mut timer = GenerationTimer::new(
            self.engine.model_name(),
            Box::new(self.telemetry.clone()),
        );

        // Metrics are recorded before the status flips so a poller that sees the
        // terminal status also sees this run in /health.
        match self.drain(ticket, prompt, config, &mut timer) {
            Ok(()) => {
                timer.finish(GenerationOutcome::Completed);
                self.jobs.complete_generation(ticket);
            }
            Err(err) => {
                tracing::warn!(job = ticket.sequence(), error = %err, "engine failure");
                timer.finish(GenerationOutcome::Failed);
                self.jobs.fail_generation(ticket, err.to_string());
            }
        }
    }

    fn drain(
        &self,
        ticket: JobTicket,
        prompt: &str,
        config: &GenerationConfig,
        timer: &mut GenerationTimer,
    ) -> infer_engine::Result<()> {
        let stream = self
            .engine
            .generate(prompt, config, self.jobs.stop_signal())?;

        for fragment in stream {
            let fragment = fragment?;
            timer.mark_fragment(&fragment);
            if !self.jobs.append_fragment(ticket, &fragment) {
                break;
            }
        }
        Ok(())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
