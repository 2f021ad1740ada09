//! Chat API endpoints: the primary interface for running turns.
//!
//! - `POST /chat`        non-streaming: `{response, thread_id}`
//! - `POST /chat/stream` SSE: `token`* `replace`? then `done` | `error`
//!
//! Request problems are answered with an HTTP error before any turn starts.
//! Once a stream has begun, failures arrive only as an `error` event.

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures_util::stream::Stream;
use serde::Deserialize;

use crate::runtime::prompts::TURN_FAILED;
use crate::runtime::{run_turn, TurnEvent, TurnInput};
use crate::state::AppState;

use super::api_error;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request shape
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    /// User message text.
    pub message: String,
    /// Thread to continue; omitted on the first turn.
    #[serde(default)]
    pub thread_id: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /chat (non-streaming)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Response {
    let input = match preflight(&state, body) {
        Ok(input) => input,
        Err(resp) => return resp,
    };

    let mut rx = run_turn(state, input);

    // Drain all events: tokens build the reply, a replace overrides it.
    let mut response = String::new();
    let mut thread_id = None;
    let mut failure = None;

    while let Some(event) = rx.recv().await {
        match event {
            TurnEvent::Token(text) => response.push_str(&text),
            TurnEvent::Replace(text) => response = text,
            TurnEvent::Done { thread_id: id } => thread_id = Some(id),
            TurnEvent::Error(message) => failure = Some(message),
        }
    }

    match (thread_id, failure) {
        (Some(thread_id), None) => Json(serde_json::json!({
            "response": response,
            "thread_id": thread_id,
        }))
        .into_response(),
        (_, failure) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            failure.unwrap_or_else(|| TURN_FAILED.to_string()),
        ),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /chat/stream (SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat_stream(
    State(state): State<AppState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Response {
    let input = match preflight(&state, body) {
        Ok(input) => input,
        Err(resp) => return resp,
    };

    let rx = run_turn(state, input);

    Sse::new(make_sse_stream(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Frame each turn event as `event: <name>` / `data: <json>`.
///
/// Dropping this stream (client disconnect) closes the channel; the turn's
/// disconnect policy decides what happens next.
fn make_sse_stream(
    mut rx: tokio::sync::mpsc::Receiver<TurnEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok(Event::default().event(event.event_name()).data(event.payload()));
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pre-flight
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Validate the body and provider readiness before a turn starts.
fn preflight(
    state: &AppState,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<TurnInput, Response> {
    // 400 syntax, 413 too large, 415 content type, 422 missing fields.
    let Json(body) = body.map_err(|rejection| api_error(rejection.status(), rejection.body_text()))?;

    if body.message.trim().is_empty() {
        return Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, "message must not be empty"));
    }

    require_llm_provider(state)?;

    Ok(TurnInput {
        thread_id: body.thread_id,
        message: body.message,
    })
}

/// Reject early with 503 when no LLM provider initialized.
fn require_llm_provider(state: &AppState) -> Result<(), Response> {
    if !state.llm.is_empty() {
        return Ok(());
    }
    Err(api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "No LLM provider is available. Configure credentials for a provider \
         under [llm.providers] and restart.",
    ))
}
