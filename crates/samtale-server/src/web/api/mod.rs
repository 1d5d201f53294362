pub mod auth;
pub mod chatbot;
pub mod conversations;
pub mod middleware;
pub mod password;
pub mod signup;
pub mod users;

use crate::state::AppState;
use axum::response::IntoResponse;
use axum::{
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// GET /api/health -- liveness probe
async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub fn build_api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Signup (OTP-gated)
        .route("/auth/request-otp", post(signup::request_otp))
        .route("/auth/verify-otp", post(signup::verify_otp))
        // Session
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/remote-logout/{token}", get(auth::remote_logout))
        .route("/auth/me", get(auth::me))
        // Password reset
        .route("/auth/forgot-password", post(password::forgot_password))
        .route("/auth/reset-password/{token}", post(password::reset_password))
        // Profile
        .route("/users/me", put(users::update_me))
        // Chat
        .route("/chatbot", post(chatbot::chatbot))
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/conversations/{id}",
            get(conversations::get_conversation).delete(conversations::delete_conversation),
        )
        .route(
            "/conversations/{id}/messages",
            post(conversations::append_message),
        )
        .with_state(state)
}
