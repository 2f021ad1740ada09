//! Thread inspection and stop.
//!
//! - `GET  /threads/:thread_id`      stored turns, oldest first
//! - `POST /threads/:thread_id/stop` cancel the thread's running turn

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::state::AppState;

use super::api_error;

pub async fn get_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Response {
    match state.store.history(&thread_id) {
        Some(turns) => Json(serde_json::json!({
            "thread_id": thread_id,
            "turns": turns,
        }))
        .into_response(),
        None => api_error(StatusCode::NOT_FOUND, format!("unknown thread: {thread_id}")),
    }
}

/// A stopped turn ends with an `error` event and stores nothing.
pub async fn stop_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> impl IntoResponse {
    let stopped = state.cancel_map.cancel(&thread_id);
    if stopped {
        tracing::info!(thread_id = %thread_id, "turn stop requested");
    }
    Json(serde_json::json!({ "stopped": stopped }))
}
