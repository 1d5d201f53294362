use crate::state::AppState;
use crate::web::api::middleware::AuthUser;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use samtale_db::UserRepo;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub photo_url: Option<String>,
}

/// PUT /api/users/me - Partial profile update
#[tracing::instrument(skip(state, req))]
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<UpdateMeRequest>,
) -> impl IntoResponse {
    let user_id = match auth.user_id() {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Name must not be empty"})),
            )
                .into_response();
        }
    }

    if let Err(e) = UserRepo::update_profile(
        &state.pool,
        user_id,
        req.name.as_deref().map(str::trim),
        req.photo_url.as_deref(),
    )
    .await
    {
        tracing::error!("Failed to update profile: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Internal server error"})),
        )
            .into_response();
    }

    match UserRepo::get_by_id(&state.pool, user_id).await {
        Ok(Some(user)) => Json(json!({"user": user.sanitized()})).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "User not found"})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to get user: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}
