use serde_json::Value;

use crate::error::{GenerationError, InputError};
use crate::model::history::{ConversationHistory, Turn};

/// The stdin document, with `history` and `message` kept raw.
///
/// Only presence is checked here. Wrong shapes surface later as a
/// generation failure, not as an input error.
#[derive(Debug, PartialEq)]
pub enum Request {
    Fields { history: Value, message: Value },
    NotAnObject(Value),
}

impl Request {
    /// History and message ready for the generator. Absent or null fields
    /// fall back to an empty history and an empty message.
    pub fn resolve(self) -> Result<(ConversationHistory, String), GenerationError> {
        let (history, message) = match self {
            Request::Fields { history, message } => (history, message),
            Request::NotAnObject(doc) => {
                return Err(GenerationError::InvalidRequest(format!(
                    "request must be an object, got {}",
                    kind(&doc)
                )))
            }
        };

        let history = match history {
            Value::Null => Vec::new(),
            Value::Array(turns) => turns.into_iter().map(Turn).collect(),
            other => {
                return Err(GenerationError::InvalidRequest(format!(
                    "history must be a list, got {}",
                    kind(&other)
                )))
            }
        };

        let message = match message {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => {
                return Err(GenerationError::InvalidRequest(format!(
                    "message must be a string, got {}",
                    kind(&other)
                )))
            }
        };

        Ok((history, message))
    }
}

/// Parse the stdin document. Only text that is not JSON at all is an error.
pub fn parse_request(input: &str) -> Result<Request, InputError> {
    let doc: Value = serde_json::from_str(input)?;

    Ok(match doc {
        Value::Object(mut fields) => Request::Fields {
            history: fields.remove("history").unwrap_or(Value::Null),
            message: fields.remove("message").unwrap_or(Value::Null),
        },
        other => Request::NotAnObject(other),
    })
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
