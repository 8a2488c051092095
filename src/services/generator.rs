use tracing::{error, info};

use crate::error::GenerationError;
use crate::model::history::Turn;
use crate::model::invocation::InvocationResult;
use crate::services::gemini_types::Reply;

/// A service that continues a conversation by one turn.
pub trait GenerativeService {
    fn send(&self, history: &[Turn], message: &str) -> Result<Reply, GenerationError>;
}

pub struct ResponseGenerator<S> {
    service: S,
}

impl<S: GenerativeService> ResponseGenerator<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Produce the reply for `message` given the prior `history`.
    ///
    /// Never fails: service errors are logged and replaced by the fixed
    /// fallback text.
    pub fn generate(&self, history: &[Turn], message: &str) -> InvocationResult {
        info!(
            turns = history.len(),
            message_len = message.len(),
            "Generating Gemini response using API..."
        );

        match self.service.send(history, message) {
            Ok(reply) => InvocationResult::text(reply.text),
            Err(e) => degrade(e),
        }
    }

    /// Answer a request whose fields could not be handed to the service.
    ///
    /// Reported the same way as a failed service call.
    pub fn reject(&self, e: GenerationError) -> InvocationResult {
        info!("Generating Gemini response using API...");
        degrade(e)
    }
}

fn degrade(e: GenerationError) -> InvocationResult {
    error!("Error generating response: {e}");
    InvocationResult::fallback()
}
