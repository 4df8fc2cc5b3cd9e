use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use dicta_http::{post_json, CallError, RetryPolicy};

/// One turn in a chat conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error(transparent)]
    Call(#[from] CallError),
    #[error("malformed chat response: {0}")]
    MalformedResponse(String),
}

/// Seam for the chat backend, so callers can be tested with a scripted
/// client instead of a live model.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a conversation and return the assistant's reply text. With
    /// `json_format` the backend is asked for strictly JSON output.
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        json_format: bool,
    ) -> Result<String, LlmError>;
}

#[async_trait]
impl<C: ChatClient + ?Sized> ChatClient for Arc<C> {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        json_format: bool,
    ) -> Result<String, LlmError> {
        (**self).chat(model, messages, json_format).await
    }
}

/// Chat client for an Ollama-compatible `/api/chat` endpoint.
///
/// Every call goes through the retry policy; the reply text lives at
/// `message.content` in the response envelope.
pub struct OllamaChatClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OllamaChatClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url, timeout, retry }
    }
}

#[async_trait]
impl ChatClient for OllamaChatClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        json_format: bool,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let mut payload = json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });
        if json_format {
            payload["format"] = json!("json");
        }

        let envelope = self
            .retry
            .run("ollama", || post_json(&self.client, &url, &payload, self.timeout))
            .await?;

        envelope
            .pointer("/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                LlmError::MalformedResponse("response is missing message.content".to_string())
            })
    }
}
