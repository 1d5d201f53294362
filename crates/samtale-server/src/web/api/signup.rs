use crate::mailer::send_detached;
use crate::signup::{VerifyOutcome, OTP_TTL};
use crate::state::AppState;
use crate::auth::hash_password;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use samtale_common::validation::{
    is_valid_email, is_valid_otp, is_valid_password, normalize_email,
};
use samtale_db::UserRepo;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RequestOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub otp: String,
}

/// POST /api/auth/request-otp
#[tracing::instrument(skip(state, req))]
pub async fn request_otp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RequestOtpRequest>,
) -> impl IntoResponse {
    if !is_valid_email(&req.email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid email address"})),
        )
            .into_response();
    }
    let email = normalize_email(&req.email);

    match UserRepo::get_by_email(&state.pool, &email).await {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({"error": "An account with this email already exists"})),
            )
                .into_response()
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("DB error during OTP request: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    }

    let code = state.pending_signups.begin(&email);

    send_detached(
        state.mailer.clone(),
        email.clone(),
        "Your Samtale verification code".to_string(),
        format!(
            "Your verification code is {}. It expires in 5 minutes.",
            code
        ),
    );

    // Best-effort eviction at expiry; identity-checked so a resent code's
    // entry is never deleted by this older timer.
    let store = state.pending_signups.clone();
    tokio::spawn(async move {
        tokio::time::sleep(OTP_TTL).await;
        store.evict_if_same(&email, &code);
    });

    Json(json!({"message": "Verification code sent"})).into_response()
}

/// POST /api/auth/verify-otp
#[tracing::instrument(skip(state, req))]
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyOtpRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Name must not be empty"})),
        )
            .into_response();
    }
    if !is_valid_email(&req.email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid email address"})),
        )
            .into_response();
    }
    if !is_valid_password(&req.password) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Password must be at least 6 characters"})),
        )
            .into_response();
    }
    if !is_valid_otp(&req.otp) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Verification code must be 6 digits"})),
        )
            .into_response();
    }

    let email = normalize_email(&req.email);

    match state.pending_signups.verify(&email, &req.otp) {
        VerifyOutcome::NotFoundOrExpired => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Verification code expired or not found, request a new one"})),
            )
                .into_response()
        }
        VerifyOutcome::Mismatch => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Incorrect verification code"})),
            )
                .into_response()
        }
        VerifyOutcome::Verified => {}
    }

    // Re-check: a concurrent signup may have created the user between the
    // OTP request and this verification.
    match UserRepo::get_by_email(&state.pool, &email).await {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(json!({"error": "An account with this email already exists"})),
            )
                .into_response()
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("DB error during OTP verification: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    }

    let password_hash = match hash_password(&req.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Failed to hash password: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    let user_id = Uuid::new_v4();
    if let Err(e) =
        UserRepo::create(&state.pool, user_id, &email, &password_hash, Some(req.name.trim())).await
    {
        // The unique constraint is the final arbiter of the signup race
        if is_unique_violation(&e) {
            return (
                StatusCode::CONFLICT,
                Json(json!({"error": "An account with this email already exists"})),
            )
                .into_response();
        }
        tracing::error!("Failed to create user: {:#}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Internal server error"})),
        )
            .into_response();
    }

    let user = match UserRepo::get_by_id(&state.pool, user_id).await {
        Ok(Some(u)) => u,
        Ok(None) | Err(_) => {
            tracing::error!("User {} missing right after creation", user_id);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response();
        }
    };

    (
        StatusCode::CREATED,
        Json(json!({
            "message": "Account created",
            "user": user.sanitized(),
        })),
    )
        .into_response()
}

fn is_unique_violation(e: &anyhow::Error) -> bool {
    e.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| db.is_unique_violation())
}
