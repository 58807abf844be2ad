//! # infer-runtime
//!
//! In-process engines and telemetry for the infer job server. Provides a
//! deterministic [`MockEngine`] for serving without model weights, a
//! [`ManualEngine`] whose fragments are pushed by a driver, and generation
//! telemetry hooks (time to first fragment, fragments/sec).

pub mod manual;
pub mod mock;
pub mod telemetry;

pub use manual::{ManualEngine, ManualFeed};
pub use mock::MockEngine;
pub use telemetry::{
    GenerationMetrics, GenerationOutcome, GenerationTimer, LogTelemetry, NoopTelemetry,
    TelemetryHook,
};
