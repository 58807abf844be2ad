//! Result retrieval and cancellation types.

use serde::{Deserialize, Serialize};

/// Body of a successful `POST /get_generated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedResponse {
    pub text: String,
}

/// Empty acknowledgement for `POST /stop`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopResponse {}
