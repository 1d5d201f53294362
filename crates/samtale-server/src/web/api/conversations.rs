use crate::chat::{history_from_rows, run_turn};
use crate::state::AppState;
use crate::web::api::chatbot::llm_error_response;
use crate::web::api::middleware::AuthUser;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use samtale_common::models::chat::{derive_title, ChatMessage, ChatRole, ConversationSummary};
use samtale_common::validation::is_valid_prompt;
use samtale_db::{ConversationRepo, ConversationRow};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub prompt: String,
}

/// Load a conversation and verify ownership. Missing and not-owned both
/// answer 404 so existence is not revealed to other users.
async fn owned_conversation(
    state: &AppState,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<ConversationRow, Response> {
    match ConversationRepo::get(&state.pool, conversation_id).await {
        Ok(Some(conv)) if conv.user_id == user_id => Ok(conv),
        Ok(_) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Conversation not found"})),
        )
            .into_response()),
        Err(e) => {
            tracing::error!("DB error loading conversation: {:#}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response())
        }
    }
}

/// GET /api/conversations -- owned conversations, most recently active first
#[tracing::instrument(skip(state))]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> impl IntoResponse {
    let user_id = match auth.user_id() {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match ConversationRepo::list_for_user(&state.pool, user_id).await {
        Ok(rows) => {
            let conversations: Vec<ConversationSummary> = rows
                .iter()
                .map(|c| ConversationSummary {
                    conversation_id: c.conversation_id,
                    title: c.title.clone(),
                    last_activity: c.last_activity,
                    created_at: c.created_at,
                })
                .collect();
            Json(json!({"conversations": conversations})).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to list conversations: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}

/// POST /api/conversations -- start a conversation with its first turn
#[tracing::instrument(skip(state, req))]
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<TurnRequest>,
) -> impl IntoResponse {
    let user_id = match auth.user_id() {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if !is_valid_prompt(&req.prompt) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Prompt must not be empty"})),
        )
            .into_response();
    }
    let prompt = req.prompt.trim();

    // Model first, persistence second: a failed turn writes nothing
    let answer = match run_turn(state.llm.as_ref(), &[], prompt).await {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!("Model call failed: {}", e);
            return llm_error_response(&e).into_response();
        }
    };

    let title = derive_title(prompt);
    match ConversationRepo::create_with_turn(&state.pool, user_id, &title, prompt, &answer).await {
        Ok(conversation_id) => (
            StatusCode::CREATED,
            Json(json!({
                "conversation_id": conversation_id,
                "title": title,
                "answer": answer,
            })),
        )
            .into_response(),
        Err(e) => {
            // The answer is preserved in the log so the turn is traceable
            tracing::error!("Failed to persist first turn (answer: {:?}): {:#}", answer, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to save the conversation"})),
            )
                .into_response()
        }
    }
}

/// POST /api/conversations/:id/messages -- append a turn
#[tracing::instrument(skip(state, req))]
pub async fn append_message(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TurnRequest>,
) -> impl IntoResponse {
    let user_id = match auth.user_id() {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if !is_valid_prompt(&req.prompt) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Prompt must not be empty"})),
        )
            .into_response();
    }
    let prompt = req.prompt.trim();

    let conversation = match owned_conversation(&state, id, user_id).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let history = match ConversationRepo::messages(&state.pool, conversation.conversation_id).await
    {
        Ok(rows) => history_from_rows(&rows),
        Err(e) => {
            tracing::error!("Failed to load history: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    let answer = match run_turn(state.llm.as_ref(), &history, prompt).await {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!("Model call failed: {}", e);
            return llm_error_response(&e).into_response();
        }
    };

    match ConversationRepo::append_turn(&state.pool, conversation.conversation_id, prompt, &answer)
        .await
    {
        Ok(()) => Json(json!({"answer": answer})).into_response(),
        Err(e) => {
            tracing::error!("Failed to persist turn (answer: {:?}): {:#}", answer, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to save the turn"})),
            )
                .into_response()
        }
    }
}

/// GET /api/conversations/:id -- conversation with messages in order
#[tracing::instrument(skip(state))]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let user_id = match auth.user_id() {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let conversation = match owned_conversation(&state, id, user_id).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match ConversationRepo::messages(&state.pool, conversation.conversation_id).await {
        Ok(rows) => {
            let messages: Vec<ChatMessage> = rows
                .iter()
                .map(|m| ChatMessage {
                    message_id: m.message_id,
                    role: ChatRole::from_str(&m.role),
                    content: m.content.clone(),
                    created_at: m.created_at,
                })
                .collect();
            Json(json!({
                "conversation_id": conversation.conversation_id,
                "title": conversation.title,
                "last_activity": conversation.last_activity,
                "messages": messages,
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!("Failed to load messages: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}

/// DELETE /api/conversations/:id
#[tracing::instrument(skip(state))]
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let user_id = match auth.user_id() {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let conversation = match owned_conversation(&state, id, user_id).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match ConversationRepo::delete(&state.pool, conversation.conversation_id).await {
        Ok(()) => Json(json!({"message": "Conversation deleted"})).into_response(),
        Err(e) => {
            tracing::error!("Failed to delete conversation: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}
