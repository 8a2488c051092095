use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One prior turn of a conversation, kept exactly as the caller sent it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(transparent)]
pub struct Turn(pub Value);

impl Turn {
    pub fn role(&self) -> Option<&str> {
        self.0.get("role").and_then(|r| r.as_str())
    }
}

pub type ConversationHistory = Vec<Turn>;
