//! Engine driven fragment-by-fragment from the outside.
//!
//! A [`ManualEngine`] and its [`ManualFeed`] share a channel. Each `generate` call
//! returns a stream that yields whatever the feed pushes until the feed calls
//! [`ManualFeed::finish`] (end of sequence) or [`ManualFeed::fail`]. The feed
//! survives across generations, so one pair can drive several jobs in sequence.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use infer_engine::{
    EngineError, GenerationConfig, GenerationEngine, Result, StoppingCriteria, TokenStream,
};

/// How often a waiting stream re-checks the stop predicate.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(5);

enum FeedEvent {
    Fragment(String),
    Fail(String),
    Finish,
}

pub struct ManualEngine {
    name: String,
    events: Receiver<FeedEvent>,
    prompts: Arc<Mutex<Vec<String>>>,
}

/// Producer side of a [`ManualEngine`].
#[derive(Clone)]
pub struct ManualFeed {
    events: Sender<FeedEvent>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ManualEngine {
    pub fn new() -> (Self, ManualFeed) {
        let (tx, rx) = unbounded();
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let engine = Self {
            name: "manual".to_string(),
            events: rx,
            prompts: Arc::clone(&prompts),
        };
        let feed = ManualFeed {
            events: tx,
            prompts,
        };
        (engine, feed)
    }
}

impl ManualFeed {
    /// Deliver one fragment to the running stream.
    ///
    /// Returns `false` if the engine is gone and the fragment was dropped.
    pub fn push(&self, fragment: impl Into<String>) -> bool {
        self.send(FeedEvent::Fragment(fragment.into()))
    }

    /// End the running stream as if the model emitted end-of-sequence.
    pub fn finish(&self) -> bool {
        self.send(FeedEvent::Finish)
    }

    /// Make the running stream yield an inference error.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.send(FeedEvent::Fail(message.into()))
    }

    fn send(&self, event: FeedEvent) -> bool {
        if self.events.send(event).is_err() {
            tracing::debug!("dropping feed event, engine is gone");
            return false;
        }
        true
    }

    /// Prompts seen by `generate`, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl GenerationEngine for ManualEngine {
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
        self.prompts.lock().push(prompt.to_string());
        Ok(Box::new(ManualStream {
            events: self.events.clone(),
            stop,
            remaining: config.max_new_tokens,
            finished: false,
        }))
    }
}

struct ManualStream {
    events: Receiver<FeedEvent>,
    stop: Arc<dyn StoppingCriteria>,
    remaining: usize,
    finished: bool,
}

impl Iterator for ManualStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.remaining == 0 {
            return None;
        }
        loop {
            if self.stop.should_stop() {
                self.finished = true;
                return None;
            }
            match self.events.recv_timeout(STOP_POLL_INTERVAL) {
                Ok(FeedEvent::Fragment(fragment)) => {
                    self.remaining -= 1;
                    return Some(Ok(fragment));
                }
                Ok(FeedEvent::Fail(message)) => {
                    self.finished = true;
                    return Some(Err(EngineError::Inference(message)));
                }
                Ok(FeedEvent::Finish) | Err(RecvTimeoutError::Disconnected) => {
                    self.finished = true;
                    return None;
                }
                Err(RecvTimeoutError::Timeout) => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infer_engine::NeverStop;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Flag(AtomicBool);

    impl StoppingCriteria for Flag {
        fn should_stop(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn yields_pushed_fragments_until_finish() {
        let (engine, feed) = ManualEngine::new();
        feed.push("foo");
        feed.push("bar");
        feed.finish();

        let fragments: Vec<String> = engine
            .generate("hello", &GenerationConfig::default(), Arc::new(NeverStop))
            .unwrap()
            .map(|f| f.unwrap())
            .collect();
        assert_eq!(fragments, vec!["foo", "bar"]);
        assert_eq!(feed.prompts(), vec!["hello"]);
    }

    #[test]
    fn fail_yields_inference_error() {
        let (engine, feed) = ManualEngine::new();
        feed.push("a");
        feed.fail("boom");

        let items: Vec<_> = engine
            .generate("p", &GenerationConfig::default(), Arc::new(NeverStop))
            .unwrap()
            .collect();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(EngineError::Inference(_))));
    }

    #[test]
    fn stop_ends_a_waiting_stream() {
        let (engine, _feed) = ManualEngine::new();
        let stop = Arc::new(Flag(AtomicBool::new(false)));
        let mut stream = engine
            .generate("p", &GenerationConfig::default(), stop.clone())
            .unwrap();

        let waiter = std::thread::spawn(move || stream.next().is_none());
        std::thread::sleep(Duration::from_millis(20));
        stop.0.store(true, Ordering::SeqCst);
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn feed_drives_consecutive_generations() {
        let (engine, feed) = ManualEngine::new();
        feed.push("one");
        feed.finish();
        feed.push("two");
        feed.finish();

        let first: Vec<_> = engine
            .generate("a", &GenerationConfig::default(), Arc::new(NeverStop))
            .unwrap()
            .collect();
        let second: Vec<_> = engine
            .generate("b", &GenerationConfig::default(), Arc::new(NeverStop))
            .unwrap()
            .collect();
        assert_eq!(first.len(), 1);
        assert_eq!(second[0].as_ref().unwrap(), "two");
        assert_eq!(feed.prompts(), vec!["a", "b"]);
    }

    #[test]
    fn feed_reports_events_dropped_after_engine_is_gone() {
        let (engine, feed) = ManualEngine::new();
        assert!(feed.push("kept"));
        drop(engine);

        assert!(!feed.push("lost"));
        assert!(!feed.finish());
        assert!(!feed.fail("boom"));
    }

    #[test]
    fn max_new_tokens_caps_manual_stream() {
        let (engine, feed) = ManualEngine::new();
        feed.push("x");
        feed.push("y");
        let config = GenerationConfig {
            max_new_tokens: 1,
            ..GenerationConfig::default()
        };
        let count = engine
            .generate("p", &config, Arc::new(NeverStop))
            .unwrap()
            .count();
        assert_eq!(count, 1);
    }
}
