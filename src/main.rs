use std::io::{self, IsTerminal, Read, Write};
use std::process::ExitCode;

use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod model;
mod protocol;
mod services;

use config::Config;
use error::{AppError, InputError};
use services::gemini::GeminiClient;
use services::generator::ResponseGenerator;

// The progress and failure lines stay visible whatever RUST_LOG says.
const GENERATOR_DIRECTIVE: &str = "gemini_reply::services::generator=info";

fn main() -> ExitCode {
    // Load .env (if present) before anything reads env vars; existing vars win
    let dotenv_path = dotenvy::dotenv().ok();

    // Diagnostics go to stderr; stdout carries only the JSON reply.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    if let Some(path) = dotenv_path {
        debug!(path = %path.display(), "loaded .env");
    }

    report(run(
        |key| std::env::var(key).ok(),
        io::stdin().lock(),
        io::stdout().lock(),
    ))
}

fn log_filter(spec: Option<&str>) -> EnvFilter {
    let filter = spec
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    match GENERATOR_DIRECTIVE.parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// One invocation: config, then stdin, then exactly one stdout line.
///
/// Config is resolved before stdin is touched.
fn run<F, R, W>(lookup: F, mut stdin: R, mut stdout: W) -> Result<(), AppError>
where
    F: Fn(&str) -> Option<String>,
    R: Read,
    W: Write,
{
    let config = Config::from_lookup(lookup)?;
    let generator = ResponseGenerator::new(GeminiClient::configure(&config)?);

    let mut input = String::new();
    stdin.read_to_string(&mut input).map_err(InputError::from)?;

    let response = protocol::handle(&input, &generator)?;

    writeln!(stdout, "{response}")
        .and_then(|_| stdout.flush())
        .map_err(AppError::Output)
}

fn report(result: Result<(), AppError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
