//! Flow execution routes: create-and-drive plus status polling.
//!
//! `POST /api/flow/execute` persists a new execution and drives it to a
//! terminal state within the same request; `GET /api/flow/status/{id}` is a
//! read-only projection for pollers. Every state transition is persisted
//! immediately, and the `running` write lands before the outbound webhook
//! call so a crash mid-call stays observable.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{error, info};

use dicta_core::config::FlowsConfig;
use dicta_core::domain::execution::{
    Dispatch, ExecutionId, ExecutionStatus, FlowExecution, Intent,
};
use dicta_core::engine::{FlowEngine, TransitionError};
use dicta_db::repositories::{ExecutionRepository, RepositoryError};
use dicta_http::{post_json, RetryPolicy};

use crate::api::{self, ApiError};

#[derive(Clone)]
pub struct FlowState {
    repository: Arc<dyn ExecutionRepository>,
    engine: FlowEngine,
    client: reqwest::Client,
    n8n_base_url: String,
    webhook_timeout: Duration,
    retry: RetryPolicy,
}

impl FlowState {
    pub fn new(
        repository: Arc<dyn ExecutionRepository>,
        client: reqwest::Client,
        config: &FlowsConfig,
    ) -> Self {
        Self {
            repository,
            engine: FlowEngine::new(),
            client,
            n8n_base_url: config.n8n_base_url.trim_end_matches('/').to_string(),
            webhook_timeout: Duration::from_secs(config.webhook_timeout_secs),
            retry: RetryPolicy::with_retries(config.max_retries),
        }
    }
}

pub fn router(state: FlowState) -> Router {
    Router::new()
        .route("/api/flow/execute", post(execute))
        .route("/api/flow/status/{execution_id}", get(status))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct FlowExecuteRequest {
    pub intent: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    pub source_text: String,
}

#[derive(Debug, Serialize)]
pub struct FlowExecuteResponse {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct FlowStatusResponse {
    pub execution_id: String,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("execution `{0}` not found")]
    NotFound(ExecutionId),
    #[error(transparent)]
    Storage(#[from] RepositoryError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

pub async fn execute(
    State(state): State<FlowState>,
    Json(request): Json<FlowExecuteRequest>,
) -> Result<Json<FlowExecuteResponse>, (StatusCode, Json<ApiError>)> {
    let Some(intent) = Intent::parse(&request.intent) else {
        return Err(api::bad_request(format!("Onbekend intent: {}", request.intent)));
    };

    let execution = state.engine.create_execution(intent, request.params, request.source_text);
    state.repository.save(execution.clone()).await.map_err(api::storage_error)?;
    info!(
        event_name = "flow.execution.created",
        execution_id = %execution.id,
        intent = intent.as_str(),
        "flow execution created"
    );

    let driven = drive(&state, &execution.id).await.map_err(drive_error)?;

    Ok(Json(FlowExecuteResponse {
        execution_id: driven.id.to_string(),
        status: driven.status,
        message: status_message(&driven),
    }))
}

pub async fn status(
    State(state): State<FlowState>,
    Path(execution_id): Path<String>,
) -> Result<Json<FlowStatusResponse>, (StatusCode, Json<ApiError>)> {
    let execution = state
        .repository
        .find_by_id(&ExecutionId(execution_id))
        .await
        .map_err(api::storage_error)?
        .ok_or_else(|| api::not_found("Uitvoering niet gevonden"))?;

    Ok(Json(FlowStatusResponse {
        execution_id: execution.id.to_string(),
        status: execution.status,
        result: execution.result,
        error: execution.error,
    }))
}

/// Drive a persisted execution to a terminal state.
///
/// Webhook failures (including exhausted retries) become a persisted
/// `error` status, not an error return; `drive` itself only fails when the
/// id does not exist or the store breaks.
pub async fn drive(state: &FlowState, id: &ExecutionId) -> Result<FlowExecution, DriveError> {
    let execution = state
        .repository
        .find_by_id(id)
        .await?
        .ok_or_else(|| DriveError::NotFound(id.clone()))?;

    match execution.intent.dispatch() {
        Dispatch::Local => {
            let done = state.engine.complete(execution, json!({"saved": true}))?;
            state.repository.save(done.clone()).await?;
            info!(
                event_name = "flow.execution.resolved_locally",
                execution_id = %done.id,
                "flow execution resolved without outbound call"
            );
            Ok(done)
        }
        Dispatch::Webhook { path } => {
            let running = state.engine.begin(execution)?;
            state.repository.save(running.clone()).await?;

            let url = format!("{}{}", state.n8n_base_url, path);
            let payload = json!({
                "execution_id": running.id,
                "intent": running.intent,
                "params": running.params,
                "source_text": running.source_text,
            });

            let outcome = state
                .retry
                .run("n8n", || post_json(&state.client, &url, &payload, state.webhook_timeout))
                .await;

            let finished = match outcome {
                Ok(result) => {
                    info!(
                        event_name = "flow.execution.webhook_succeeded",
                        execution_id = %running.id,
                        webhook = path,
                        "webhook call succeeded"
                    );
                    state.engine.complete(running, result)?
                }
                Err(call_error) => {
                    error!(
                        event_name = "flow.execution.webhook_failed",
                        execution_id = %running.id,
                        webhook = path,
                        error = %call_error,
                        "webhook call failed"
                    );
                    state.engine.fail(running, call_error.to_string())?
                }
            };

            state.repository.save(finished.clone()).await?;
            Ok(finished)
        }
    }
}

fn status_message(execution: &FlowExecution) -> String {
    match execution.status {
        ExecutionStatus::Success => "Flow uitgevoerd".to_string(),
        ExecutionStatus::Error => {
            execution.error.clone().unwrap_or_else(|| "Uitvoering mislukt".to_string())
        }
        ExecutionStatus::Pending | ExecutionStatus::Running => "Bezig...".to_string(),
    }
}

fn drive_error(error: DriveError) -> (StatusCode, Json<ApiError>) {
    match error {
        DriveError::NotFound(id) => api::not_found(format!("Uitvoering {id} niet gevonden")),
        DriveError::Storage(storage) => api::storage_error(storage),
        DriveError::Transition(transition) => {
            error!(event_name = "flow.execution.illegal_transition", error = %transition, "illegal state transition");
            (
                StatusCode::CONFLICT,
                Json(ApiError { detail: "Uitvoering is al afgerond".to_string() }),
            )
        }
    }
}
