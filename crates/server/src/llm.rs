//! Thin chat and summarize proxies over the model backend.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use dicta_agent::llm::{ChatClient, ChatMessage};
use dicta_agent::summarize::Summarizer;
use dicta_core::config::LlmConfig;

use crate::api::{self, ApiError};

#[derive(Clone)]
pub struct ChatState {
    client: Arc<dyn ChatClient>,
    chat_model: String,
    summarizer: Summarizer<Arc<dyn ChatClient>>,
}

impl ChatState {
    pub fn new(client: Arc<dyn ChatClient>, config: &LlmConfig) -> Self {
        Self {
            client: client.clone(),
            chat_model: config.chat_model.clone(),
            summarizer: Summarizer::new(client, config.chat_model.clone()),
        }
    }
}

pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/summarize", post(summarize))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub summary: String,
}

/// Conversation passthrough: no system prompt is injected, the caller owns
/// the history.
pub async fn chat(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ApiError>)> {
    let reply = state
        .client
        .chat(&state.chat_model, &request.messages, false)
        .await
        .map_err(api::llm_error)?;

    Ok(Json(ChatResponse { reply }))
}

pub async fn summarize(
    State(state): State<ChatState>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, (StatusCode, Json<ApiError>)> {
    let summary = state.summarizer.summarize(&request.text).await.map_err(api::llm_error)?;

    Ok(Json(SummarizeResponse { summary }))
}
