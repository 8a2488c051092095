use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{ConfigError, GenerationError};
use crate::model::history::Turn;
use crate::services::gemini_types::{
    GenerateContentRequest, GenerateContentResponse, GenerationConfig, Reply, SafetySetting,
};
use crate::services::generator::GenerativeService;

const ERROR_SNIPPET_LEN: usize = 400;

/// Blocking client for the Gemini `generateContent` endpoint.
///
/// Mirrors the chat shape of the official SDKs: configure once, pick a
/// model, start a chat seeded with history, send a message.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    api_base: String,
    default_model: String,
    max_output_tokens: Option<u32>,
}

impl GeminiClient {
    pub fn configure(config: &Config) -> Result<Self, ConfigError> {
        let http = Client::builder().build()?;
        Ok(Self::with_http(config, http))
    }

    pub fn with_http(config: &Config, http: Client) -> Self {
        debug!(
            api_key = %config.masked_api_key(),
            model = %config.model,
            api_base = %config.api_base,
            "Gemini client configured"
        );

        Self {
            http,
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
            default_model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
        }
    }

    pub fn model(&self, name: &str) -> GenerativeModel<'_> {
        GenerativeModel {
            client: self,
            name: name.to_string(),
        }
    }

    fn endpoint_for(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }
}

impl GenerativeService for GeminiClient {
    fn send(&self, history: &[Turn], message: &str) -> Result<Reply, GenerationError> {
        self.model(&self.default_model)
            .start_chat(history)
            .send_message(message)
    }
}

pub struct GenerativeModel<'a> {
    client: &'a GeminiClient,
    name: String,
}

impl<'a> GenerativeModel<'a> {
    pub fn start_chat(&self, history: &[Turn]) -> ChatSession<'a> {
        ChatSession {
            client: self.client,
            model: self.name.clone(),
            contents: history.iter().map(to_content).collect(),
        }
    }
}

pub struct ChatSession<'a> {
    client: &'a GeminiClient,
    model: String,
    contents: Vec<Value>,
}

impl ChatSession<'_> {
    /// Send one user turn and wait for the reply.
    pub fn send_message(&self, message: &str) -> Result<Reply, GenerationError> {
        let mut contents = self.contents.clone();
        contents.push(json!({ "role": "user", "parts": [{ "text": message }] }));

        let body = build_request(contents, self.client.max_output_tokens);
        let endpoint = self.client.endpoint_for(&self.model);

        debug!(
            model = %self.model,
            turns = body.contents.len(),
            message_len = message.len(),
            "sending generateContent request"
        );

        let resp = self
            .client
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.client.api_key)
            .json(&body)
            .send()?;

        let status = resp.status();

        // Read as text first so an error body survives a JSON failure.
        let text = resp.text()?;

        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                message: extract_error_message(status, &text),
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)?;
        let reply = reply_from(parsed)?;

        info!(model = %self.model, response_len = reply.text.len(), "Gemini response received");

        Ok(reply)
    }
}

fn build_request(contents: Vec<Value>, max_output_tokens: Option<u32>) -> GenerateContentRequest {
    GenerateContentRequest {
        contents,
        generation_config: max_output_tokens.map(|max_output_tokens| GenerationConfig {
            max_output_tokens,
        }),
        safety_settings: vec![SafetySetting {
            category: "HARM_CATEGORY_HARASSMENT",
            threshold: "BLOCK_ONLY_HIGH",
        }],
    }
}

/// Turn a history entry into a wire `Content`.
///
/// Entries that already carry `parts` go through untouched. A plain
/// `{role, content}` or `{role, text}` entry gets its string wrapped in a
/// single text part. Anything else is left for the service to judge.
fn to_content(turn: &Turn) -> Value {
    let value = &turn.0;

    if value.get("parts").is_some() {
        return value.clone();
    }

    let text = value
        .get("content")
        .or_else(|| value.get("text"))
        .and_then(|t| t.as_str());

    match text {
        Some(text) => {
            let mut content = json!({ "parts": [{ "text": text }] });
            if let Some(role) = turn.role() {
                content["role"] = Value::from(role);
            }
            content
        }
        None => value.clone(),
    }
}

fn reply_from(resp: GenerateContentResponse) -> Result<Reply, GenerationError> {
    let candidate = match resp.candidates.into_iter().next() {
        Some(c) => c,
        None => {
            return Err(match resp.prompt_feedback.and_then(|f| f.block_reason) {
                Some(reason) => GenerationError::Blocked(reason),
                None => GenerationError::EmptyReply("no candidates returned".into()),
            });
        }
    };

    let texts: Vec<String> = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if texts.is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "candidate has no text parts".into());
        return Err(GenerationError::EmptyReply(format!("finish reason {reason}")));
    }

    Ok(Reply {
        text: texts.concat(),
    })
}

fn extract_error_message(status: StatusCode, body_text: &str) -> String {
    // Google APIs use { "error": { "message": "..." } }; some proxies use { "message": "..." }
    if let Ok(v) = serde_json::from_str::<Value>(body_text) {
        if let Some(msg) = v
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
        if let Some(msg) = v.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }

    let trimmed = body_text.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string();
    }

    if trimmed.chars().count() > ERROR_SNIPPET_LEN {
        let snippet: String = trimmed.chars().take(ERROR_SNIPPET_LEN).collect();
        format!("{snippet}...")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    fn config(api_base: &str) -> Config {
        Config {
            api_key: "test-key-9876".into(),
            model: "gemini-test".into(),
            api_base: api_base.into(),
            max_output_tokens: None,
        }
    }

    fn client_for(api_base: &str) -> GeminiClient {
        let http = Client::builder().no_proxy().build().unwrap();
        GeminiClient::with_http(&config(api_base), http)
    }

    /// Serve one canned HTTP response on loopback and hand back the raw request.
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}/v1beta", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            let header_end = loop {
                let n = stream.read(&mut chunk).unwrap();
                assert!(n > 0, "client closed before sending headers");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse::<usize>().unwrap())
                .unwrap_or(0);

            while buf.len() < header_end + content_length {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();

            String::from_utf8_lossy(&buf).into_owned()
        });

        (base, handle)
    }

    #[test]
    fn configure_reports_startup_errors() {
        let built: Result<GeminiClient, ConfigError> =
            GeminiClient::configure(&config("http://127.0.0.1:1/v1beta"));
        let client = built.unwrap();
        assert_eq!(
            client.endpoint_for("gemini-test"),
            "http://127.0.0.1:1/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn plain_turns_are_wrapped_into_parts() {
        let turn = Turn(json!({ "role": "model", "content": "earlier answer" }));
        assert_eq!(
            to_content(&turn),
            json!({ "role": "model", "parts": [{ "text": "earlier answer" }] })
        );
    }

    #[test]
    fn native_turns_pass_through() {
        let raw = json!({ "role": "user", "parts": [{ "text": "hi" }], "extra": 1 });
        assert_eq!(to_content(&Turn(raw.clone())), raw);

        let odd = json!("just a string");
        assert_eq!(to_content(&Turn(odd.clone())), odd);
    }

    #[test]
    fn request_body_shape() {
        let body = build_request(vec![json!({ "role": "user", "parts": [] })], Some(1000));
        let v = serde_json::to_value(&body).unwrap();

        assert_eq!(v["generationConfig"]["maxOutputTokens"], 1000);
        assert_eq!(v["safetySettings"][0]["category"], "HARM_CATEGORY_HARASSMENT");
        assert_eq!(v["safetySettings"][0]["threshold"], "BLOCK_ONLY_HIGH");
        assert_eq!(v["contents"].as_array().unwrap().len(), 1);

        let without = serde_json::to_value(build_request(Vec::new(), None)).unwrap();
        assert!(without.get("generationConfig").is_none());
    }

    #[test]
    fn reply_concatenates_text_parts() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "hi " }, { "text": "there" }] },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(reply_from(resp).unwrap().text, "hi there");
    }

    #[test]
    fn blocked_prompt_is_reported() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        match reply_from(resp) {
            Err(GenerationError::Blocked(reason)) => assert_eq!(reason, "SAFETY"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn candidate_without_text_is_empty_reply() {
        let resp: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "finishReason": "MAX_TOKENS" }]
        }))
        .unwrap();
        match reply_from(resp) {
            Err(GenerationError::EmptyReply(msg)) => assert!(msg.contains("MAX_TOKENS")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn error_message_prefers_service_text() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            extract_error_message(StatusCode::BAD_REQUEST, body),
            "API key not valid."
        );
        assert_eq!(
            extract_error_message(StatusCode::BAD_GATEWAY, ""),
            "Bad Gateway"
        );

        let long = "x".repeat(1000);
        let msg = extract_error_message(StatusCode::INTERNAL_SERVER_ERROR, &long);
        assert_eq!(msg.len(), ERROR_SNIPPET_LEN + 3);
    }

    #[test]
    fn chat_round_trip_over_http() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"hi there"}]},"finishReason":"STOP"}]}"#,
        );
        let client = client_for(&base);
        let history = vec![Turn(json!({ "role": "user", "content": "before" }))];

        let chat = client.model("gemini-test").start_chat(&history);
        let reply = chat.send_message("hello").unwrap();
        assert_eq!(reply.text, "hi there");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /v1beta/models/gemini-test:generateContent"));
        assert!(request.contains("x-goog-api-key: test-key-9876"));
        assert!(request.contains(r#""text":"before""#));
        assert!(request.contains(r#""text":"hello""#));
    }

    #[test]
    fn http_error_status_is_typed() {
        let (base, server) = serve_once(
            "429 Too Many Requests",
            r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#,
        );
        let client = client_for(&base);

        match client.send(&[], "hello") {
            Err(GenerationError::Status { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "Quota exceeded");
            }
            other => panic!("unexpected: {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn non_json_success_body_is_invalid_json() {
        let (base, server) = serve_once("200 OK", "<html>not json</html>");
        let client = client_for(&base);

        assert!(matches!(
            client.send(&[], "hello"),
            Err(GenerationError::InvalidJson(_))
        ));
        server.join().unwrap();
    }

    #[test]
    fn unreachable_service_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{addr}/v1beta"));
        assert!(matches!(
            client.send(&[], "hello"),
            Err(GenerationError::Transport(_))
        ));
    }
}
