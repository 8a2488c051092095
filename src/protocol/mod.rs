use crate::error::InputError;
use crate::model::invocation::InvocationResult;
use crate::services::generator::{GenerativeService, ResponseGenerator};

mod request;
pub use request::parse_request;

/// Run one request document through the generator and return the output line.
pub fn handle<S: GenerativeService>(
    input: &str,
    generator: &ResponseGenerator<S>,
) -> Result<String, InputError> {
    let result = match parse_request(input)?.resolve() {
        Ok((history, message)) => generator.generate(&history, &message),
        Err(e) => generator.reject(e),
    };
    Ok(render(&result))
}

fn render(result: &InvocationResult) -> String {
    serde_json::to_string(result).unwrap_or_else(|_| {
        serde_json::json!({ "response": crate::model::invocation::FALLBACK_RESPONSE }).to_string()
    })
}
