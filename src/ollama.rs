use reqwest::StatusCode;
use serde_json::value::RawValue;
use std::error::Error as _;
use std::time::Duration;

use crate::models::ChatRequest;

pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum DownstreamError {
    /// Ollama answered, but not with a 2xx.
    #[error("Ollama returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Connection refused, DNS failure, timeout and friends.
    #[error("{0}")]
    Transport(String),

    /// 2xx response whose body is not JSON.
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

impl DownstreamError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DownstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// reqwest hides the interesting part (e.g. "Connection refused") in the source chain
fn describe(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Prepends `http://` when no scheme is given and drops trailing slashes.
pub fn normalize_base_url(url: &str) -> String {
    let url = url.trim();
    let full_url = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    };
    full_url.trim_end_matches('/').to_string()
}

/// Client for the single local Ollama server.
#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    health_timeout: Duration,
    chat_timeout: Duration,
}

impl OllamaClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: normalize_base_url(base_url),
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            chat_timeout: DEFAULT_CHAT_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, health: Duration, chat: Duration) -> Self {
        self.health_timeout = health;
        self.chat_timeout = chat;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // Ollama health endpoint, lists installed models
    pub async fn check_health(&self) -> Result<(), DownstreamError> {
        let url = format!("{}/api/tags", self.base_url);
        let res = self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| DownstreamError::Transport(describe(&e)))?;

        let status = res.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = res.text().await.unwrap_or_default();
            Err(DownstreamError::Status { status, body })
        }
    }

    /// One POST to `/v1/chat/completions`, no retries.
    ///
    /// The body is checked to be JSON but kept as the exact text Ollama sent.
    pub async fn chat_completions(
        &self,
        payload: &ChatRequest,
    ) -> Result<Box<RawValue>, DownstreamError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let res = self
            .client
            .post(&url)
            .timeout(self.chat_timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| DownstreamError::Transport(describe(&e)))?;

        let status = res.status();
        if !status.is_success() {
            let body = res
                .text()
                .await
                .map_err(|e| DownstreamError::Transport(describe(&e)))?;
            return Err(DownstreamError::Status { status, body });
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| DownstreamError::Transport(describe(&e)))?;
        serde_json::from_slice::<Box<RawValue>>(&bytes)
            .map_err(|e| DownstreamError::InvalidBody(e.to_string()))
    }
}
