//! # infer-engine
//!
//! The "narrow waist" between the job server and whatever produces text. Defines
//! the [`GenerationEngine`] trait, the [`StoppingCriteria`] the engine consults
//! every decoding step, and the sampling parameters carried by a request.
//! Implementations can swap a real model backend for a mock without changing the
//! server.
//!
//! ## Design Notes
//!
//! ### Streams, not callbacks
//! [`GenerationEngine::generate`] returns a [`TokenStream`]: a blocking iterator of
//! text fragments. Prompt processing happens inside `generate`, so a caller holding
//! a stream always holds a live producer. Each item is a `Result` so a failure in
//! the middle of decoding reaches the consumer instead of silently truncating.
//!
//! ### Cooperative stopping
//! Engines must check the supplied [`StoppingCriteria`] once per generated token and
//! end the stream when it returns `true`. Stop latency is therefore one decode step.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type for all engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),
    #[error("Tokenization failed: {0}")]
    Tokenization(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Invalid generation config: {0}")]
    InvalidConfig(String),
}

/// Blocking, finite sequence of generated text fragments.
pub type TokenStream = Box<dyn Iterator<Item = Result<String>> + Send>;

/// Per-step predicate deciding whether generation should halt early.
pub trait StoppingCriteria: Send + Sync {
    fn should_stop(&self) -> bool;
}

/// Never requests a stop. Useful for one-off generations outside the job server.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

impl StoppingCriteria for NeverStop {
    fn should_stop(&self) -> bool {
        false
    }
}

/// Sampling parameters for one generation call.
///
/// Every field has a default, so clients may send a partial object (or none).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Penalty applied to repeating tokens.
    pub repetition_penalty: f64,
    /// Maximum number of new tokens to generate.
    pub max_new_tokens: usize,
    /// Controls randomness; lower is more deterministic.
    pub temperature: f64,
    /// Fraction of the probability mass considered when sampling.
    pub top_p: f64,
    /// Number of highest probability tokens kept for sampling.
    pub top_k: usize,
    /// Sample from the distribution instead of taking the argmax.
    pub do_sample: bool,
    /// Reuse the KV cache between steps.
    pub use_cache: bool,
    pub return_dict_in_generate: bool,
    pub output_attentions: bool,
    pub output_hidden_states: bool,
    pub output_scores: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            repetition_penalty: 1.1,
            max_new_tokens: 2000,
            temperature: 0.05,
            top_p: 0.95,
            top_k: 40,
            do_sample: true,
            use_cache: true,
            return_dict_in_generate: true,
            output_attentions: false,
            output_hidden_states: false,
            output_scores: false,
        }
    }
}

impl GenerationConfig {
    /// Reject parameter combinations no sampler can honor.
    pub fn validate(&self) -> Result<()> {
        if self.temperature < 0.0 || !self.temperature.is_finite() {
            return Err(EngineError::InvalidConfig(format!(
                "temperature must be non-negative (got {})",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(EngineError::InvalidConfig(format!(
                "top_p must be within [0, 1] (got {})",
                self.top_p
            )));
        }
        if self.repetition_penalty <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "repetition_penalty must be positive (got {})",
                self.repetition_penalty
            )));
        }
        Ok(())
    }
}

/// The core engine trait.
///
/// `generate` takes `&self` so one engine can be shared behind an `Arc` between
/// the request handlers and the background worker. Backends that need mutable
/// model state are responsible for their own interior locking.
pub trait GenerationEngine: Send + Sync {
    /// Name reported by the health endpoint.
    fn model_name(&self) -> &str;

    /// Process the prompt and return a stream of generated fragments.
    ///
    /// The stream ends on end-of-sequence, after `config.max_new_tokens` steps,
    /// or at the first step where `stop.should_stop()` returns `true`.
    fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        stop: Arc<dyn StoppingCriteria>,
    ) -> Result<TokenStream>;
}
