//! Deterministic mock engine.
//!
//! Echoes the prompt back one word per decoding step (cycling when the prompt is
//! shorter than `max_new_tokens`), or replays a fixed script. Useful for serving
//! the job API without model weights and for exercising the job lifecycle in tests.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use infer_engine::{
    EngineError, GenerationConfig, GenerationEngine, Result, StoppingCriteria, TokenStream,
};

pub const DEFAULT_MODEL_NAME: &str = "mock-echo";

#[derive(Debug, Clone)]
pub struct MockEngine {
    name: String,
    script: Option<Vec<String>>,
    step_delay: Duration,
    fail_after: Option<(usize, String)>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            name: DEFAULT_MODEL_NAME.to_string(),
            script: None,
            step_delay: Duration::ZERO,
            fail_after: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replay these fragments instead of echoing the prompt.
    pub fn with_script<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script = Some(fragments.into_iter().map(Into::into).collect());
        self
    }

    /// Simulated compute time per decoding step.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Emit `fragments` fragments, then fail with an inference error.
    pub fn failing_after(mut self, fragments: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((fragments, message.into()));
        self
    }

    fn fragments_for(&self, prompt: &str) -> Result<Vec<String>> {
        if let Some(script) = &self.script {
            return Ok(script.clone());
        }
        let words: Vec<String> = prompt.split_whitespace().map(str::to_string).collect();
        if words.is_empty() {
            return Err(EngineError::Tokenization(
                "prompt produced no tokens".to_string(),
            ));
        }
        Ok(words)
    }
}

impl GenerationEngine for MockEngine {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        stop: Arc<dyn StoppingCriteria>,
    ) -> Result<TokenStream> {
        config.validate()?;
        let fragments = self.fragments_for(prompt)?;
        let cycle = self.script.is_none();

        Ok(Box::new(MockStream {
            fragments,
            cycle,
            produced: 0,
            max_new_tokens: config.max_new_tokens,
            step_delay: self.step_delay,
            fail_after: self.fail_after.clone(),
            stop,
            finished: false,
        }))
    }
}

struct MockStream {
    fragments: Vec<String>,
    cycle: bool,
    produced: usize,
    max_new_tokens: usize,
    step_delay: Duration,
    fail_after: Option<(usize, String)>,
    stop: Arc<dyn StoppingCriteria>,
    finished: bool,
}

impl MockStream {
    fn next_fragment(&self) -> Option<String> {
        let idx = if self.cycle {
            self.produced % self.fragments.len()
        } else {
            self.produced
        };
        let word = self.fragments.get(idx)?;
        if self.cycle && self.produced > 0 {
            Some(format!(" {word}"))
        } else {
            Some(word.clone())
        }
    }
}

impl Iterator for MockStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.produced >= self.max_new_tokens {
            return None;
        }
        if !self.step_delay.is_zero() {
            thread::sleep(self.step_delay);
        }
        if self.stop.should_stop() {
            self.finished = true;
            return None;
        }
        if let Some((after, message)) = &self.fail_after {
            if self.produced == *after {
                self.finished = true;
                return Some(Err(EngineError::Inference(message.clone())));
            }
        }

        match self.next_fragment() {
            Some(fragment) => {
                self.produced += 1;
                Some(Ok(fragment))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}
