//! Cardwright Model Client Layer
//!
//! Talks to a locally hosted, OpenAI-compatible chat-completion endpoint.
//!
//! # Architecture
//!
//! The pipeline depends only on the [`ChatModel`] trait defined here. A call
//! sends one system/user prompt pair and returns the accumulated generated
//! text. Implementations must honour the caller's [`CancellationToken`] and
//! report a stop as [`LlmError::Cancelled`], which is never retried.
//!
//! # Providers
//!
//! - `MockModel`: Scripted replies keyed by prompt substring, for testing
//! - `OpenAiCompatClient`: Streaming HTTP client with retry and backoff
//!
//! # Examples
//!
//! ```
//! use cardwright_llm::{ChatModel, CompletionRequest, MockModel};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test_block_on(async {
//! let model = MockModel::new("[]").with_reply("photosynthesis", r#"[{"question":"Q","answer":"A"}]"#);
//! let request = CompletionRequest::new("system", "Text: photosynthesis in plants");
//! let reply = model.complete(&request, &CancellationToken::new()).await.unwrap();
//! assert!(reply.contains("question"));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

#![warn(missing_docs)]

pub mod openai;

use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use openai::{ModelSettings, OpenAiCompatClient};

/// Errors that can occur during model calls
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Connection refused, timed out or dropped mid-stream
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a 5xx status
    #[error("Server error (HTTP {status}): {body}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        body: String,
    },

    /// The server rejected the request with a non-success, non-5xx status
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        body: String,
    },

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Invalid response from the model server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The caller requested a stop
    #[error("Stopped by caller")]
    Cancelled,

    /// Reachability probe failed
    #[error("Inference server unreachable: {0}")]
    Unreachable(String),

    /// The client could not be constructed
    #[error("Client configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Network(_) | LlmError::Server { .. })
    }

    /// Whether the error reports a caller-requested stop
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LlmError::Cancelled)
    }
}

/// One chat-style completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// System instruction
    pub system: String,

    /// User prompt
    pub user: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Token cap; `None` lets the server decide
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Create a request with the default temperature and no token cap
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the token cap
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A chat model the pipeline can drive
pub trait ChatModel: Send + Sync {
    /// Send one request and return the full generated text
    ///
    /// Implementations check `cancel` while reading and return
    /// [`LlmError::Cancelled`] as soon as it fires.
    fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Lightweight pre-flight check that the endpoint can be reached
    fn check_reachable(&self) -> impl Future<Output = Result<(), LlmError>> + Send;
}

/// Scripted reply for [`MockModel`]
#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Fail(LlmError),
}

#[derive(Debug, Default)]
struct MockState {
    requests: Vec<CompletionRequest>,
    probes: usize,
}

/// Mock chat model for deterministic testing
///
/// Replies are chosen by the first registered pattern that occurs in the
/// user prompt; unmatched prompts get the default response. No network
/// calls are made.
///
/// # Examples
///
/// ```
/// use cardwright_llm::{LlmError, MockModel};
///
/// let model = MockModel::new("[]")
///     .with_reply("chapter one", r#"{"question":"Q1","answer":"A1"}"#)
///     .with_failure("chapter two", LlmError::Network("connection reset".into()));
/// assert_eq!(model.call_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockModel {
    default_response: String,
    rules: Vec<(String, MockReply)>,
    reachable: bool,
    delay: Option<Duration>,
    state: Arc<Mutex<MockState>>,
}

impl MockModel {
    /// Create a mock that answers every prompt with `response`
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            rules: Vec::new(),
            reachable: true,
            delay: None,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Create a mock whose reachability probe fails
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::default()
        }
    }

    /// Reply with `response` when the user prompt contains `pattern`
    pub fn with_reply(mut self, pattern: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules
            .push((pattern.into(), MockReply::Text(response.into())));
        self
    }

    /// Fail with `error` when the user prompt contains `pattern`
    pub fn with_failure(mut self, pattern: impl Into<String>, error: LlmError) -> Self {
        self.rules.push((pattern.into(), MockReply::Fail(error)));
        self
    }

    /// Sleep before answering; the sleep is interrupted by cancellation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of completion calls received
    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Number of reachability probes received
    pub fn probe_count(&self) -> usize {
        self.lock().probes
    }

    /// Every completion request received, in arrival order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn reply_for(&self, prompt: &str) -> MockReply {
        self.rules
            .iter()
            .find(|(pattern, _)| prompt.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| MockReply::Text(self.default_response.clone()))
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new("[]")
    }
}

impl ChatModel for MockModel {
    async fn complete(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        self.lock().requests.push(request.clone());

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }

        match self.reply_for(&request.user) {
            MockReply::Text(text) => Ok(text),
            MockReply::Fail(error) => Err(error),
        }
    }

    async fn check_reachable(&self) -> Result<(), LlmError> {
        self.lock().probes += 1;
        if self.reachable {
            Ok(())
        } else {
            Err(LlmError::Unreachable("mock endpoint is down".to_string()))
        }
    }
}
