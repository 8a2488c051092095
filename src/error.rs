use thiserror::Error;

/// Startup failures. Any of these ends the process with status 1.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },
}

/// Failures of the generative service call.
///
/// These never reach the process output: the generator logs them and
/// replaces the reply with the fixed fallback text.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid JSON from service: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("prompt blocked: {0}")]
    Blocked(String),

    #[error("empty reply: {0}")]
    EmptyReply(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Standard input that cannot be read or is not JSON at all.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to read input: {0}")]
    Read(#[from] std::io::Error),

    #[error("input is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Anything that ends a run with status 1.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("failed to write output: {0}")]
    Output(std::io::Error),
}
