pub mod chat;
pub mod health;
pub mod threads;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Routes that are never rate limited.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/threads/:thread_id", get(threads::get_thread))
        .route("/threads/:thread_id/stop", post(threads::stop_thread))
}

/// The two chat endpoints, with the request body capped at `max_body_bytes`.
pub fn chat_routes(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat::chat))
        .route("/chat/stream", post(chat::chat_stream))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}
