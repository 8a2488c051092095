use serde::{Deserialize, Serialize};

pub const FALLBACK_RESPONSE: &str = "Error generating response.";

/// The single record written to stdout per run.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    pub response: String,
}

impl InvocationResult {
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }

    pub fn fallback() -> Self {
        Self::text(FALLBACK_RESPONSE)
    }
}
