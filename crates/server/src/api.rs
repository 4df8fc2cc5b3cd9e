//! Shared response-error shapes and the mapping from layer errors to HTTP.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::error;

use dicta_agent::llm::LlmError;
use dicta_db::repositories::RepositoryError;
use dicta_http::CallError;

/// Error body for every failing route: `{"detail": "..."}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub detail: String,
}

pub fn bad_request(detail: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (StatusCode::BAD_REQUEST, Json(ApiError { detail: detail.into() }))
}

pub fn not_found(detail: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (StatusCode::NOT_FOUND, Json(ApiError { detail: detail.into() }))
}

/// Storage failures are fatal for the operation in progress and are never
/// hidden behind a success response.
pub fn storage_error(error: RepositoryError) -> (StatusCode, Json<ApiError>) {
    error!(event_name = "api.storage_error", error = %error, "storage failure");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiError { detail: "Opslag niet beschikbaar".to_string() }),
    )
}

/// Model-backend failures: a 4xx from the backend passes through with its
/// own status and body; transport failures and 5xx (after the client's
/// retries) surface as 503.
pub fn llm_error(error: LlmError) -> (StatusCode, Json<ApiError>) {
    match error {
        LlmError::Call(CallError::Status { status, body, .. }) if status < 500 => {
            let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (code, Json(ApiError { detail: body }))
        }
        LlmError::Call(call_error) => {
            error!(event_name = "api.llm_unavailable", error = %call_error, "model backend unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiError { detail: "LLM-service niet beschikbaar".to_string() }),
            )
        }
        LlmError::MalformedResponse(detail) => {
            error!(event_name = "api.llm_malformed", detail = %detail, "model backend returned an unusable envelope");
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiError { detail: "Ongeldig antwoord van LLM-service".to_string() }),
            )
        }
    }
}
