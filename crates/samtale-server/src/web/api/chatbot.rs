use crate::chat::run_turn;
use crate::llm::LlmError;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use samtale_common::models::chat::HistoryEntry;
use samtale_common::validation::is_valid_prompt;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ChatbotRequest {
    pub prompt: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Map a model failure to its status and user-facing message.
/// Each failure kind gets a distinct message so the client can show
/// something actionable.
pub(crate) fn llm_error_response(e: &LlmError) -> (StatusCode, Json<serde_json::Value>) {
    let (status, message) = match e {
        LlmError::Timeout => (
            StatusCode::REQUEST_TIMEOUT,
            "The model took too long to answer, please try again",
        ),
        LlmError::Blocked(_) => (
            StatusCode::BAD_GATEWAY,
            "The answer was blocked by the model's content filter",
        ),
        LlmError::Empty => (
            StatusCode::BAD_GATEWAY,
            "The model returned no usable answer, please rephrase",
        ),
        LlmError::Upstream(_) => (
            StatusCode::BAD_GATEWAY,
            "The model service is currently unavailable",
        ),
    };
    (status, Json(json!({"error": message})))
}

/// POST /api/chatbot -- one-shot turn with caller-supplied history.
/// Unauthenticated and unpersisted.
#[tracing::instrument(skip(state, req))]
pub async fn chatbot(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatbotRequest>,
) -> impl IntoResponse {
    if !is_valid_prompt(&req.prompt) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Prompt must not be empty"})),
        )
            .into_response();
    }

    match run_turn(state.llm.as_ref(), &req.history, req.prompt.trim()).await {
        Ok(answer) => Json(json!({"answer": answer})).into_response(),
        Err(e) => {
            tracing::warn!("Model call failed: {}", e);
            llm_error_response(&e).into_response()
        }
    }
}
