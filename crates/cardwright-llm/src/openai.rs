//! OpenAI-compatible Streaming Client
//!
//! Provides integration with local inference servers that speak the
//! `/v1/chat/completions` protocol (LM Studio, llama.cpp server, vLLM).
//!
//! # Features
//!
//! - Streaming responses read line by line (`data: {...}` fragments)
//! - Cancellation checked before every line is parsed
//! - Retry with exponential backoff for network failures and 5xx replies
//! - Reachability probe: models listing, falling back to a TCP connect
//!
//! # Examples
//!
//! ```no_run
//! use cardwright_llm::{ModelSettings, OpenAiCompatClient};
//!
//! let settings = ModelSettings::default().with_model("qwen2.5-7b-instruct");
//! let client = OpenAiCompatClient::new(settings).unwrap();
//! ```

use crate::{ChatModel, CompletionRequest, LlmError};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default chat-completion endpoint (LM Studio)
pub const DEFAULT_ENDPOINT: &str = "http://localhost:1234/v1/chat/completions";

/// Default bearer token; local servers accept any value
pub const DEFAULT_API_KEY: &str = "lm-studio";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "local-model";

/// Default timeout for connecting and for each streamed read (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default reachability probe timeout (seconds)
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 3;

/// Default number of attempts per call
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Connection settings for an OpenAI-compatible server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Full chat-completions URL
    pub endpoint: String,

    /// Bearer token sent with every request
    pub api_key: String,

    /// Model identifier sent in the payload
    pub model: String,

    /// Connect timeout and per-read stall timeout, in seconds
    pub timeout_secs: u64,

    /// Timeout for each reachability check, in seconds
    pub probe_timeout_secs: u64,

    /// Attempts per call (network failures and 5xx only)
    pub max_attempts: u32,

    /// First backoff delay in milliseconds; doubles per retry
    pub backoff_base_ms: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: 1000,
        }
    }
}

impl ModelSettings {
    /// Set the endpoint URL
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the bearer token
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Set the model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the attempt count
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the first backoff delay
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base_ms = base.as_millis() as u64;
        self
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.trim().is_empty() {
            return Err("endpoint must not be empty".to_string());
        }
        reqwest::Url::parse(&self.endpoint)
            .map_err(|e| format!("endpoint is not a valid URL: {}", e))?;
        if self.model.trim().is_empty() {
            return Err("model must not be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be > 0".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be > 0".to_string());
        }
        Ok(())
    }
}

/// Streaming chat-completion client
pub struct OpenAiCompatClient {
    settings: ModelSettings,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// What a single line of the event stream means
#[derive(Debug, PartialEq)]
enum StreamLine {
    Fragment(String),
    Done,
    Skip,
}

fn parse_stream_line(line: &str) -> StreamLine {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return StreamLine::Skip;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return StreamLine::Done;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .map(StreamLine::Fragment)
            .unwrap_or(StreamLine::Skip),
        Err(e) => {
            debug!("Skipping malformed stream fragment: {}", e);
            StreamLine::Skip
        }
    }
}

impl OpenAiCompatClient {
    /// Create a client from settings
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] if the settings are invalid or the HTTP
    /// client cannot be built.
    pub fn new(settings: ModelSettings) -> Result<Self, LlmError> {
        settings.validate().map_err(LlmError::Config)?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { settings, client })
    }

    /// The settings this client was built with
    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeout_secs)
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.probe_timeout_secs)
    }

    /// One request, no retries
    async fn stream_once(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let payload = ChatPayload {
            model: &self.settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            stream: true,
            max_tokens: request.max_tokens.filter(|tokens| *tokens > 0),
        };

        let send = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(&self.settings.api_key)
            .json(&payload)
            .send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            sent = timeout(self.read_timeout(), send) => sent
                .map_err(|_| LlmError::Network("timed out waiting for response headers".to_string()))?
                .map_err(|e| LlmError::Network(format!("Request failed: {}", e)))?,
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(self.settings.model.clone()));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(if status.is_server_error() {
                LlmError::Server {
                    status: status.as_u16(),
                    body,
                }
            } else {
                LlmError::Http {
                    status: status.as_u16(),
                    body,
                }
            });
        }

        let mut stream = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        let mut generated = String::new();
        let mut saw_data = false;
        let mut saw_text = false;

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                next = timeout(self.read_timeout(), stream.next()) => next
                    .map_err(|_| LlmError::Network("stream stalled".to_string()))?,
            };
            let Some(bytes) = next else {
                break;
            };
            let bytes = bytes.map_err(|e| LlmError::Network(format!("Stream interrupted: {}", e)))?;
            pending.extend_from_slice(&bytes);

            while let Some(newline) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=newline).collect();
                if cancel.is_cancelled() {
                    return Err(LlmError::Cancelled);
                }
                let line = String::from_utf8_lossy(&line);
                saw_data |= line.trim_start().starts_with("data:");
                saw_text |= !line.trim().is_empty() && !line.starts_with(':');
                match parse_stream_line(&line) {
                    StreamLine::Fragment(text) => generated.push_str(&text),
                    StreamLine::Done => return Ok(generated),
                    StreamLine::Skip => {}
                }
            }
        }

        // Connection closed without the sentinel; a final unterminated line may remain
        if !pending.is_empty() {
            if cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }
            let line = String::from_utf8_lossy(&pending);
            saw_data |= line.trim_start().starts_with("data:");
            saw_text |= !line.trim().is_empty() && !line.starts_with(':');
            if let StreamLine::Fragment(text) = parse_stream_line(&line) {
                generated.push_str(&text);
            }
        }

        if saw_text && !saw_data {
            return Err(LlmError::InvalidResponse(
                "expected an event stream of `data:` lines".to_string(),
            ));
        }

        Ok(generated)
    }

    /// Stream a completion, retrying network failures with backoff
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The caller cancels (never retried)
    /// - The model is not available (404)
    /// - The body is not an event stream
    /// - The server rejects the request (4xx)
    /// - Every attempt fails with a network error or 5xx (the last one is returned)
    pub async fn generate(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < max_attempts {
            if cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }

            match self.stream_once(request, cancel).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() => {
                    warn!(
                        "Model call failed (attempt {}/{}): {}",
                        attempts + 1,
                        max_attempts,
                        e
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }

            attempts += 1;
            if attempts < max_attempts {
                // Exponential backoff: 1s, 2s, 4s, etc.
                let delay =
                    Duration::from_millis(self.settings.backoff_base_ms * 2u64.pow(attempts - 1));
                tokio::select! {
                    _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Network("Max retries exceeded".to_string())))
    }

    /// Check that the server can be reached
    ///
    /// Tries `GET {scheme}://{host}/v1/models` first; any answer other than
    /// 200 falls back to a plain TCP connect to the endpoint's host and port.
    pub async fn probe(&self) -> Result<(), LlmError> {
        let url = reqwest::Url::parse(&self.settings.endpoint)
            .map_err(|e| LlmError::Unreachable(format!("invalid endpoint: {}", e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| LlmError::Unreachable("endpoint has no host".to_string()))?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let models_url = format!("{}://{}/v1/models", url.scheme(), authority);
        let listing = self
            .client
            .get(&models_url)
            .bearer_auth(&self.settings.api_key)
            .timeout(self.probe_timeout())
            .send()
            .await;
        match listing {
            Ok(response) if response.status() == reqwest::StatusCode::OK => return Ok(()),
            Ok(response) => debug!("Models listing answered {}", response.status()),
            Err(e) => debug!("Models listing failed: {}", e),
        }

        let port = url.port_or_known_default().unwrap_or(80);
        let address = format!("{}:{}", host, port);
        match timeout(self.probe_timeout(), TcpStream::connect(&address)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(LlmError::Unreachable(format!("{}: {}", address, e))),
            Err(_) => Err(LlmError::Unreachable(format!("{}: connection timed out", address))),
        }
    }
}

impl ChatModel for OpenAiCompatClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        self.generate(request, cancel).await
    }

    async fn check_reachable(&self) -> Result<(), LlmError> {
        self.probe().await
    }
}
