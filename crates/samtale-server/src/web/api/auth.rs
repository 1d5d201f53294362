use crate::auth::{
    create_access_token, generate_logout_token, generate_refresh_token, sha256_hex,
    verify_password,
};
use crate::mailer::send_detached;
use crate::state::AppState;
use crate::web::api::middleware::AuthUser;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use samtale_common::validation::normalize_email;
use samtale_db::{RefreshTokenRepo, UserRepo};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Lifetime of an emailed remote-logout link.
const LOGOUT_TOKEN_TTL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// POST /api/auth/login
#[tracing::instrument(skip(state, req))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let email = normalize_email(&req.email);

    let user = match UserRepo::get_by_email(&state.pool, &email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Invalid email or password"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("DB error during login: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    match verify_password(&req.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Invalid email or password"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("Password verification error: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    }

    let access_token = match create_access_token(
        &user.user_id.to_string(),
        &user.email,
        &state.config.auth.jwt_secret,
    ) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("Failed to create access token: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    let (raw_refresh, refresh_hash) = generate_refresh_token();
    let expires_at = Utc::now() + Duration::days(30);

    if let Err(e) =
        RefreshTokenRepo::create(&state.pool, &refresh_hash, user.user_id, expires_at).await
    {
        tracing::error!("Failed to store refresh token: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Internal server error"})),
        )
            .into_response();
    }

    if let Err(e) = UserRepo::touch_last_login(&state.pool, user.user_id).await {
        tracing::warn!("Failed to update last_login_at: {:#}", e);
    }

    // Login alert with a single-use remote logout link. Best-effort; the
    // token expires on its own if the mail never arrives.
    let logout_token = generate_logout_token();
    state
        .logout_tokens
        .insert(logout_token.clone(), user.user_id, LOGOUT_TOKEN_TTL);
    let link = format!(
        "{}/api/auth/remote-logout/{}",
        state.config.auth.base_url.trim_end_matches('/'),
        logout_token
    );
    send_detached(
        state.mailer.clone(),
        user.email.clone(),
        "New login to your Samtale account".to_string(),
        format!(
            "Your account was just signed in to. If this wasn't you, open this link to sign out \
             all devices: {}\nThe link expires in 1 hour.",
            link
        ),
    );
    let tokens = state.logout_tokens.clone();
    tokio::spawn(async move {
        tokio::time::sleep(LOGOUT_TOKEN_TTL).await;
        tokens.remove(&logout_token);
    });

    Json(TokenResponse {
        access_token,
        refresh_token: raw_refresh,
    })
    .into_response()
}

/// POST /api/auth/refresh
#[tracing::instrument(skip(state, req))]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> impl IntoResponse {
    let token_hash = sha256_hex(&req.refresh_token);

    let token_row = match RefreshTokenRepo::get_by_hash(&state.pool, &token_hash).await {
        Ok(Some(row)) => row,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Invalid refresh token"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("DB error during refresh: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    if token_row.expires_at < Utc::now() {
        let _ = RefreshTokenRepo::delete(&state.pool, &token_hash).await;
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Refresh token expired"})),
        )
            .into_response();
    }

    // Delete old token (rotation)
    if let Err(e) = RefreshTokenRepo::delete(&state.pool, &token_hash).await {
        tracing::error!("Failed to delete old refresh token: {:#}", e);
    }

    let user = match UserRepo::get_by_id(&state.pool, token_row.user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "User not found"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("DB error looking up user: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    let access_token = match create_access_token(
        &user.user_id.to_string(),
        &user.email,
        &state.config.auth.jwt_secret,
    ) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("Failed to create access token: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    let (raw_refresh, refresh_hash) = generate_refresh_token();
    let expires_at = Utc::now() + Duration::days(30);

    if let Err(e) =
        RefreshTokenRepo::create(&state.pool, &refresh_hash, user.user_id, expires_at).await
    {
        tracing::error!("Failed to store new refresh token: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Internal server error"})),
        )
            .into_response();
    }

    Json(TokenResponse {
        access_token,
        refresh_token: raw_refresh,
    })
    .into_response()
}

/// POST /api/auth/logout
#[tracing::instrument(skip(state, req))]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LogoutRequest>,
) -> impl IntoResponse {
    let token_hash = sha256_hex(&req.refresh_token);

    if let Err(e) = RefreshTokenRepo::delete(&state.pool, &token_hash).await {
        tracing::error!("Failed to delete refresh token: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Internal server error"})),
        )
            .into_response();
    }

    Json(json!({"status": "ok"})).into_response()
}

/// GET /api/auth/remote-logout/:token
///
/// Reached from the emailed login-alert link; needs no bearer token since
/// the person clicking it is locked out of the session being revoked.
#[tracing::instrument(skip(state, token))]
pub async fn remote_logout(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    // Single use: taken under one lock so concurrent clicks cannot both pass
    let Some(user_id) = state.logout_tokens.take_if_valid(&token) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid or expired link"})),
        )
            .into_response();
    };

    match RefreshTokenRepo::delete_all_for_user(&state.pool, user_id).await {
        Ok(revoked) => {
            tracing::info!("Remote logout revoked {} session(s) for {}", revoked, user_id);
            Json(json!({"message": "All sessions have been signed out"})).into_response()
        }
        Err(e) => {
            tracing::error!("Failed remote logout: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}

/// GET /api/auth/me
#[tracing::instrument(skip(state))]
pub async fn me(State(state): State<Arc<AppState>>, auth: AuthUser) -> impl IntoResponse {
    let user_id = match auth.user_id() {
        Ok(id) => id,
        Err(resp) => return resp,
    };

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
