//! # infer-cli
//!
//! HTTP client for the infer job server.
//!
//! [`InferenceClient`] wraps the four job endpoints and adds
//! [`InferenceClient::generate_to_completion`], which starts a job, polls it,
//! reports text as it grows, and claims the result once it is done.

use std::time::Duration;

use infer_engine::GenerationConfig;
use infer_server::models::{GeneratedResponse, InferRequest, InferResponse, StopResponse};
use infer_server::{JobSnapshot, JobStatus};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Address the server binary listens on by default.
pub const DEFAULT_URL: &str = "http://localhost:9090";

/// Errors from talking to the job server.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("job left generating unexpectedly (status is {0})")]
    Interrupted(JobStatus),
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone)]
pub struct InferenceClient {
    base_url: String,
    http: reqwest::Client,
}

impl InferenceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a job. Fails with a 400 [`ClientError::Status`] if one is running.
    pub async fn infer(&self, prompt: &str, config: GenerationConfig) -> Result<()> {
        let body = InferRequest {
            prompt: prompt.to_string(),
            config,
        };
        let _: InferResponse = self.post("infer", &body).await?;
        Ok(())
    }

    pub async fn status(&self) -> Result<JobSnapshot> {
        self.post("status", &serde_json::json!({})).await
    }

    /// Claim the finished text. Succeeds once per job.
    pub async fn get_generated(&self) -> Result<String> {
        let resp: GeneratedResponse = self.post("get_generated", &serde_json::json!({})).await?;
        Ok(resp.text)
    }

    pub async fn stop(&self) -> Result<()> {
        let _: StopResponse = self.post("stop", &serde_json::json!({})).await?;
        Ok(())
    }

    /// Start a job and poll it until it finishes.
    ///
    /// `on_progress` receives each newly appended piece of text. Returns the
    /// claimed result, or [`ClientError::Generation`] if the job ends in `error`.
    pub async fn generate_to_completion<F>(
        &self,
        prompt: &str,
        config: GenerationConfig,
        poll_interval: Duration,
        mut on_progress: F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        self.infer(prompt, config).await?;

        let mut seen = 0;
        loop {
            match self.status().await? {
                JobSnapshot::Generating { text } => {
                    report_new_text(&text, &mut seen, &mut on_progress);
                }
                JobSnapshot::DoneGenerating { text } => {
                    report_new_text(&text, &mut seen, &mut on_progress);
                    return self.get_generated().await;
                }
                JobSnapshot::Error { text, error } => {
                    report_new_text(&text, &mut seen, &mut on_progress);
                    return Err(ClientError::Generation(error));
                }
                other => return Err(ClientError::Interrupted(other.status())),
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(%url, "POST");
        let resp = self.http.post(&url).json(body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            let message = body["error"]["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            return Err(ClientError::Status {
                code: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await?)
    }
}

fn report_new_text(text: &str, seen: &mut usize, on_progress: &mut impl FnMut(&str)) {
    if text.len() < *seen || !text.is_char_boundary(*seen) {
        *seen = 0;
    }
    if text.len() > *seen {
        on_progress(&text[*seen..]);
        *seen = text.len();
    }
}
