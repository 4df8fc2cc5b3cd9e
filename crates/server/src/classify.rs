use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use dicta_agent::classifier::IntentClassifier;
use dicta_agent::llm::ChatClient;
use dicta_core::config::LlmConfig;
use dicta_core::domain::execution::Intent;

use crate::api::{self, ApiError};

#[derive(Clone)]
pub struct ClassifyState {
    classifier: IntentClassifier<Arc<dyn ChatClient>>,
}

impl ClassifyState {
    pub fn new(client: Arc<dyn ChatClient>, config: &LlmConfig) -> Self {
        Self { classifier: IntentClassifier::new(client, config.classify_model.clone()) }
    }
}

pub fn router(state: ClassifyState) -> Router {
    Router::new().route("/api/classify", post(classify)).with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub intent: Intent,
    pub params: Map<String, Value>,
    pub confidence: f64,
}

pub async fn classify(
    State(state): State<ClassifyState>,
    Json(request): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>, (StatusCode, Json<ApiError>)> {
    let classification =
        state.classifier.classify(&request.text).await.map_err(api::llm_error)?;

    Ok(Json(ClassifyResponse {
        intent: classification.intent,
        params: classification.params,
        confidence: classification.confidence,
    }))
}
