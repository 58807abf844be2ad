//! Start request/response types.

use infer_engine::GenerationConfig;
use serde::{Deserialize, Serialize};

/// Body of `POST /infer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferRequest {
    pub prompt: String,
    #[serde(default)]
    pub config: GenerationConfig,
}

/// Empty acknowledgement; the job runs in the background.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferResponse {}
