//! One chat turn, end to end.
//!
//! [`run_turn`] spawns the pipeline and hands back a channel of
//! [`TurnEvent`]s. The HTTP layer either frames them as SSE or drains them
//! into a single JSON response; the CLI prints them.
//!
//! Pipeline: thread lock, history, input check, engine, output check,
//! append, `done`. Exactly one terminal event (`done` or `error`) is sent
//! and it is always last. A `replace` is sent at most once, after every
//! token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::Instrument;

use ta_domain::config::{DisconnectPolicy, ROLE_AGENT};
use ta_domain::trace::TraceEvent;
use ta_sessions::Resolved;

use super::cancel::CancelToken;
use super::engine::{build_messages, Engine, EngineOutcome};
use super::guardrail::Verdict;
use super::prompts::{
    REFUSAL_REPLY, SANITIZED_REPLY, STEP_LIMIT_REPLY, TURN_FAILED, TURN_STOPPED,
};
use crate::state::AppState;

/// Logged previews of user text are cut to this many characters.
const LOG_PREVIEW_CHARS: usize = 80;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TurnEvent: the client-facing protocol
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Events emitted during a single turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum TurnEvent {
    /// Incremental reply text.
    Token(String),
    /// Discard every token of this turn and show this text instead.
    Replace(String),
    /// Terminal: the turn finished and was stored under `thread_id`.
    Done { thread_id: String },
    /// Terminal: the turn failed; nothing was stored.
    Error(String),
}

impl TurnEvent {
    /// SSE `event:` field.
    pub fn event_name(&self) -> &'static str {
        match self {
            TurnEvent::Token(_) => "token",
            TurnEvent::Replace(_) => "replace",
            TurnEvent::Done { .. } => "done",
            TurnEvent::Error(_) => "error",
        }
    }

    /// SSE `data:` field: a JSON string, or `{"thread_id": ...}` for `done`.
    pub fn payload(&self) -> String {
        match self {
            TurnEvent::Token(text) | TurnEvent::Replace(text) | TurnEvent::Error(text) => {
                serde_json::to_string(text).unwrap_or_default()
            }
            TurnEvent::Done { thread_id } => {
                serde_json::json!({ "thread_id": thread_id }).to_string()
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::Done { .. } | TurnEvent::Error(_))
    }
}

/// Input to a single turn.
#[derive(Debug, Clone)]
pub struct TurnInput {
    /// Thread to continue. Absent or unknown ids start a new thread.
    pub thread_id: Option<String>,
    pub message: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EventSink
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Sending half of a turn's event channel.
///
/// A failed send or a closed channel means the consumer went away. Under
/// [`DisconnectPolicy::Abort`] that cancels the turn; under
/// [`DisconnectPolicy::Finish`] the turn keeps running unobserved.
pub struct EventSink {
    tx: mpsc::Sender<TurnEvent>,
    cancel: CancelToken,
    policy: DisconnectPolicy,
    disconnected: AtomicBool,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<TurnEvent>, cancel: CancelToken, policy: DisconnectPolicy) -> Self {
        Self {
            tx,
            cancel,
            policy,
            disconnected: AtomicBool::new(false),
        }
    }

    pub async fn send(&self, event: TurnEvent) {
        if self.disconnected.load(Ordering::Acquire) {
            return;
        }
        if self.tx.send(event).await.is_err() {
            self.disconnected.store(true, Ordering::Release);
            match self.policy {
                DisconnectPolicy::Abort => {
                    tracing::info!("client disconnected, aborting turn");
                    self.cancel.cancel();
                }
                DisconnectPolicy::Finish => {
                    tracing::info!("client disconnected, finishing turn in the background");
                }
            }
        }
    }

    pub async fn token(&self, text: &str) {
        self.send(TurnEvent::Token(text.to_string())).await;
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire) || self.tx.is_closed()
    }

    /// True when the turn must not be stored: it was stopped, or its
    /// client left under [`DisconnectPolicy::Abort`].
    pub fn should_stop(&self) -> bool {
        self.cancel.is_cancelled()
            || (self.policy == DisconnectPolicy::Abort && self.is_disconnected())
    }

    /// Under [`DisconnectPolicy::Abort`], waits for the consumer to go away
    /// and cancels the turn. Never resolves under `Finish`.
    pub async fn abort_on_disconnect(&self) {
        match self.policy {
            DisconnectPolicy::Abort => {
                self.tx.closed().await;
                if !self.disconnected.swap(true, Ordering::AcqRel) {
                    tracing::info!("client disconnected, aborting turn");
                }
                self.cancel.cancel();
            }
            DisconnectPolicy::Finish => std::future::pending().await,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// run_turn
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one turn in the background and return its event stream.
pub fn run_turn(state: AppState, input: TurnInput) -> mpsc::Receiver<TurnEvent> {
    let (tx, rx) = mpsc::channel::<TurnEvent>(64);
    let span = tracing::info_span!("turn", thread_id = tracing::field::Empty);
    tokio::spawn(drive_turn(state, input, tx).instrument(span));
    rx
}

struct TurnSummary {
    outcome: &'static str,
    steps: u32,
    tool_calls: u32,
}

impl TurnSummary {
    fn early(outcome: &'static str) -> Self {
        Self {
            outcome,
            steps: 0,
            tool_calls: 0,
        }
    }
}

async fn drive_turn(state: AppState, input: TurnInput, tx: mpsc::Sender<TurnEvent>) {
    let requested = input.thread_id.clone().filter(|id| !id.trim().is_empty());

    // Held for the whole turn: the next turn on this thread reads history
    // only after this one has appended.
    let permit = match &requested {
        Some(id) => match state.session_locks.acquire(id).await {
            Ok(permit) => Some(permit),
            Err(e) => {
                tracing::error!(error = %e, "thread lock unavailable");
                let _ = tx.send(TurnEvent::Error(TURN_FAILED.into())).await;
                return;
            }
        },
        None => None,
    };

    let resolved = state.store.get_or_create(requested.as_deref());
    let thread_id = resolved.session_id.clone();
    tracing::Span::current().record("thread_id", thread_id.as_str());

    let cancel = state.cancel_map.register(&thread_id);
    let sink = EventSink::new(tx, cancel.clone(), state.config.conversation.on_disconnect);

    tracing::info!(
        is_new = resolved.is_new,
        prior_turns = resolved.history.len(),
        message = %preview(&input.message),
        "turn started"
    );

    // The watcher only cancels; the turn itself still runs to its next
    // suspension point and reports `cancelled`.
    let mut turn = std::pin::pin!(execute(&state, &resolved, &input.message, &sink, &cancel));
    let summary = tokio::select! {
        biased;
        summary = &mut turn => summary,
        _ = sink.abort_on_disconnect() => turn.await,
    };
    state.cancel_map.remove(&thread_id, &cancel);

    TraceEvent::TurnFinished {
        session_id: thread_id,
        outcome: summary.outcome.into(),
        steps: summary.steps,
        tool_calls: summary.tool_calls,
    }
    .emit();

    drop(permit);
    state.session_locks.prune_idle();
}

async fn execute(
    state: &AppState,
    resolved: &Resolved,
    message: &str,
    sink: &EventSink,
    cancel: &CancelToken,
) -> TurnSummary {
    let thread_id = resolved.session_id.as_str();

    // ── Input check ──────────────────────────────────────────────────
    let verdict = tokio::select! {
        biased;
        _ = cancel.cancelled() => return stopped(sink, TurnSummary::early("cancelled")).await,
        verdict = state.guardrail.check_input(&resolved.history, message) => verdict,
    };
    if let Verdict::Rejected(reason) = verdict {
        tracing::info!(%reason, "input rejected");
        sink.token(REFUSAL_REPLY).await;
        return commit(state, thread_id, message, REFUSAL_REPLY, sink, TurnSummary::early("refused"))
            .await;
    }
    if cancel.is_cancelled() {
        return stopped(sink, TurnSummary::early("cancelled")).await;
    }

    // ── Agent loop ───────────────────────────────────────────────────
    let Some(binding) = state.llm.for_role(ROLE_AGENT) else {
        tracing::error!("no provider for the agent role");
        sink.send(TurnEvent::Error(TURN_FAILED.into())).await;
        return TurnSummary::early("failed");
    };
    let engine = Engine::new(
        binding,
        state.tools.as_ref(),
        &state.config.agent,
        Duration::from_millis(state.config.llm.default_timeout_ms),
    );
    let run = engine
        .run(build_messages(&resolved.history, message), sink, cancel)
        .await;
    let summary = TurnSummary {
        outcome: run.outcome.label(),
        steps: run.steps,
        tool_calls: run.tool_calls,
    };

    let draft = match run.outcome {
        EngineOutcome::Completed(text) => text,
        EngineOutcome::StepLimit(text) if !text.trim().is_empty() => text,
        EngineOutcome::StepLimit(_) => {
            sink.token(STEP_LIMIT_REPLY).await;
            STEP_LIMIT_REPLY.to_string()
        }
        EngineOutcome::Cancelled => return stopped(sink, summary).await,
        EngineOutcome::Failed(error) => {
            tracing::error!(%error, "turn failed");
            sink.send(TurnEvent::Error(TURN_FAILED.into())).await;
            return summary;
        }
    };

    // ── Output check ─────────────────────────────────────────────────
    let verdict = tokio::select! {
        biased;
        _ = cancel.cancelled() => return stopped(sink, summary).await,
        verdict = state.guardrail.check_output(message, &draft) => verdict,
    };
    let reply = match verdict {
        Verdict::Allowed => draft,
        Verdict::Rejected(reason) => {
            tracing::warn!(%reason, "reply replaced by output check");
            sink.send(TurnEvent::Replace(SANITIZED_REPLY.into())).await;
            SANITIZED_REPLY.to_string()
        }
    };

    commit(state, thread_id, message, &reply, sink, summary).await
}

/// Append the approved reply, then send `done`. A stopped or abandoned
/// turn appends nothing.
async fn commit(
    state: &AppState,
    thread_id: &str,
    message: &str,
    reply: &str,
    sink: &EventSink,
    summary: TurnSummary,
) -> TurnSummary {
    if sink.should_stop() {
        return stopped(sink, summary).await;
    }
    match state.store.append(thread_id, message, reply) {
        Ok(_) => {
            sink.send(TurnEvent::Done {
                thread_id: thread_id.to_string(),
            })
            .await;
            summary
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to store turn");
            sink.send(TurnEvent::Error(TURN_FAILED.into())).await;
            TurnSummary {
                outcome: "failed",
                ..summary
            }
        }
    }
}

async fn stopped(sink: &EventSink, summary: TurnSummary) -> TurnSummary {
    tracing::info!("turn cancelled, nothing stored");
    sink.send(TurnEvent::Error(TURN_STOPPED.into())).await;
    TurnSummary {
        outcome: "cancelled",
        ..summary
    }
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
    if text.chars().count() > LOG_PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}
