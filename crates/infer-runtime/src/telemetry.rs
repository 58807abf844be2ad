//! Telemetry hooks for generation jobs.
//!
//! Provides:
//! - [`GenerationMetrics`]: time to first fragment, fragments/sec, and run summary
//! - [`TelemetryHook`] trait: callback interface for real-time metric reporting
//! - [`GenerationTimer`]: records timestamps and computes metrics
//! - [`NoopTelemetry`] / [`LogTelemetry`]: built-in hook implementations

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// How a generation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// The stream was exhausted (end of sequence, token limit, or stop request).
    Completed,
    /// The engine reported a failure.
    Failed,
}

/// Aggregate metrics from a generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationMetrics {
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub outcome: GenerationOutcome,
    /// Time from start until the first fragment arrived, in milliseconds.
    pub ttff_ms: f64,
    /// Fragments per second after the first one arrived.
    pub fragments_per_sec: f64,
    pub fragments: usize,
    /// Characters of generated text.
    pub chars: usize,
    pub total_time_ms: f64,
}

/// Callback trait for real-time generation telemetry.
///
/// All methods have default no-op implementations so hooks can be selective.
pub trait TelemetryHook: Send + Sync {
    /// Called when the first fragment of a run arrives.
    fn on_first_fragment(&self, _ttff_ms: f64) {}

    /// Called after each fragment is recorded.
    fn on_fragment(&self, _fragment_idx: usize, _elapsed_ms: f64) {}

    /// Called when the run finishes with the full metrics summary.
    fn on_generation_complete(&self, _metrics: &GenerationMetrics) {}
}

/// No-op telemetry hook.
#[derive(Debug, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetryHook for NoopTelemetry {}

/// Keeps the last completed run's metrics and logs each summary.
#[derive(Debug, Clone)]
pub struct LogTelemetry {
    last_report: Arc<Mutex<Option<GenerationMetrics>>>,
}

impl Default for LogTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl LogTelemetry {
    pub fn new() -> Self {
        Self {
            last_report: Arc::new(Mutex::new(None)),
        }
    }

    /// Retrieve the last completed generation's metrics.
    pub fn last_metrics(&self) -> Option<GenerationMetrics> {
        self.last_report.lock().clone()
    }
}

impl TelemetryHook for LogTelemetry {
    fn on_generation_complete(&self, metrics: &GenerationMetrics) {
        tracing::info!(
            model = %metrics.model,
            outcome = ?metrics.outcome,
            fragments = metrics.fragments,
            ttff_ms = metrics.ttff_ms,
            fragments_per_sec = metrics.fragments_per_sec,
            total_time_ms = metrics.total_time_ms,
            "generation finished"
        );
        *self.last_report.lock() = Some(metrics.clone());
    }
}

/// Records timestamps during a generation run to compute [`GenerationMetrics`].
///
/// Usage:
/// 1. Call [`GenerationTimer::new`] when the engine call starts
/// 2. Call [`GenerationTimer::mark_fragment`] for each fragment drained
/// 3. Call [`GenerationTimer::finish`] to compute final metrics
pub struct GenerationTimer {
    model: String,
    started_at: DateTime<Utc>,
    start: Instant,
    first_fragment: Option<Instant>,
    fragment_count: usize,
    chars: usize,
    hook: Box<dyn TelemetryHook>,
}

impl GenerationTimer {
    pub fn new(model: impl Into<String>, hook: Box<dyn TelemetryHook>) -> Self {
        Self {
            model: model.into(),
            started_at: Utc::now(),
            start: Instant::now(),
            first_fragment: None,
            fragment_count: 0,
            chars: 0,
            hook,
        }
    }

    /// Record one drained fragment. Fires `on_first_fragment` once, then `on_fragment`.
    pub fn mark_fragment(&mut self, fragment: &str) {
        let now = Instant::now();
        if self.first_fragment.is_none() {
            self.first_fragment = Some(now);
            let ttff_ms = now.duration_since(self.start).as_secs_f64() * 1000.0;
            self.hook.on_first_fragment(ttff_ms);
        }
        self.fragment_count += 1;
        self.chars += fragment.chars().count();
        let elapsed_ms = now.duration_since(self.start).as_secs_f64() * 1000.0;
        self.hook.on_fragment(self.fragment_count, elapsed_ms);
    }

    pub fn fragments(&self) -> usize {
        self.fragment_count
    }

    /// Finalize and return metrics. Fires `on_generation_complete`.
    pub fn finish(self, outcome: GenerationOutcome) -> GenerationMetrics {
        let total_time_ms = self.start.elapsed().as_secs_f64() * 1000.0;

        let ttff_ms = self
            .first_fragment
            .map(|t| t.duration_since(self.start).as_secs_f64() * 1000.0)
            .unwrap_or(0.0);

        let stream_time_ms = total_time_ms - ttff_ms;
        let fragments_per_sec = if stream_time_ms > 0.0 && self.fragment_count > 0 {
            self.fragment_count as f64 / (stream_time_ms / 1000.0)
        } else {
            0.0
        };

        let metrics = GenerationMetrics {
            model: self.model,
            started_at: self.started_at,
            outcome,
            ttff_ms,
            fragments_per_sec,
            fragments: self.fragment_count,
            chars: self.chars,
            total_time_ms,
        };

        self.hook.on_generation_complete(&metrics);
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_metrics() -> GenerationMetrics {
        GenerationMetrics {
            model: "mock".to_string(),
            started_at: Utc::now(),
            outcome: GenerationOutcome::Completed,
            ttff_ms: 12.5,
            fragments_per_sec: 80.0,
            fragments: 8,
            chars: 40,
            total_time_ms: 112.5,
        }
    }

    #[test]
    fn noop_telemetry_compiles_and_runs() {
        let hook = NoopTelemetry;
        hook.on_first_fragment(10.0);
        hook.on_fragment(1, 15.0);
        hook.on_generation_complete(&sample_metrics());
    }

    #[test]
    fn log_telemetry_captures_metrics() {
        let hook = LogTelemetry::new();
        assert!(hook.last_metrics().is_none());

        hook.on_generation_complete(&sample_metrics());

        let captured = hook.last_metrics().unwrap();
        assert_eq!(captured.ttff_ms, 12.5);
        assert_eq!(captured.fragments, 8);
    }

    #[test]
    fn timer_counts_fragments_and_chars() {
        let mut timer = GenerationTimer::new("mock", Box::new(NoopTelemetry));
        timer.mark_fragment("foo");
        timer.mark_fragment("bar");
        timer.mark_fragment("é");
        assert_eq!(timer.fragments(), 3);

        let metrics = timer.finish(GenerationOutcome::Completed);
        assert_eq!(metrics.fragments, 3);
        assert_eq!(metrics.chars, 7);
        assert_eq!(metrics.model, "mock");
        assert!(metrics.ttff_ms >= 0.0);
        assert!(metrics.total_time_ms >= metrics.ttff_ms);
    }

    #[test]
    fn timer_fires_hooks() {
        let log = LogTelemetry::new();
        let mut timer = GenerationTimer::new("mock", Box::new(log.clone()));
        timer.mark_fragment("a");
        let metrics = timer.finish(GenerationOutcome::Failed);

        assert_eq!(metrics.outcome, GenerationOutcome::Failed);
        let captured = log.last_metrics().unwrap();
        assert_eq!(captured.fragments, 1);
        assert_eq!(captured.outcome, GenerationOutcome::Failed);
    }

    #[test]
    fn first_fragment_hook_fires_once() {
        struct Counting(Arc<AtomicUsize>);
        impl TelemetryHook for Counting {
            fn on_first_fragment(&self, _ttff_ms: f64) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let mut timer = GenerationTimer::new("mock", Box::new(Counting(count.clone())));
        timer.mark_fragment("a");
        timer.mark_fragment("b");
        timer.finish(GenerationOutcome::Completed);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timer_without_fragments() {
        let timer = GenerationTimer::new("mock", Box::new(NoopTelemetry));
        let metrics = timer.finish(GenerationOutcome::Completed);
        assert_eq!(metrics.ttff_ms, 0.0);
        assert_eq!(metrics.fragments, 0);
        assert_eq!(metrics.fragments_per_sec, 0.0);
    }

    #[test]
    fn metrics_serialize_outcome_snake_case() {
        let json = serde_json::to_value(sample_metrics()).unwrap();
        assert_eq!(json["outcome"], "completed");
        assert_eq!(json["fragments"], 8);
    }
}
