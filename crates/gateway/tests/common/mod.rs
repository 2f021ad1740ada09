//! Fakes shared by the gateway integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use ta_domain::capability::LlmCapabilities;
use ta_domain::config::{Config, ROLE_AGENT, ROLE_GUARDRAIL};
use ta_domain::error::Result;
use ta_domain::stream::{BoxStream, StreamEvent};
use ta_domain::tool::{MessageContent, ToolDefinition};
use ta_gateway::runtime::guardrail::{Guardrail, Verdict};
use ta_gateway::runtime::{run_turn, TurnEvent, TurnInput};
use ta_gateway::state::AppState;
use ta_providers::{ChatRequest, ChatResponse, LlmProvider, ProviderRegistry};
use ta_sessions::{InMemoryConversationStore, Turn};
use ta_tools::{ToolInvoker, ToolOutcome, TravelTool};

// ── Scripts ─────────────────────────────────────────────────────────

/// A model reply streamed as the given chunks.
pub fn text(chunks: &[&str]) -> Vec<StreamEvent> {
    let mut events: Vec<StreamEvent> = chunks
        .iter()
        .map(|c| StreamEvent::Token { text: c.to_string() })
        .collect();
    events.push(done());
    events
}

/// A model step that requests one tool call.
pub fn tool_call(call_id: &str, tool_name: &str, arguments: Value) -> Vec<StreamEvent> {
    vec![
        StreamEvent::ToolCallFinished {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        },
        done(),
    ]
}

/// A model call that fails mid-stream.
pub fn stream_error(message: &str) -> Vec<StreamEvent> {
    vec![StreamEvent::Error {
        message: message.into(),
    }]
}

/// A model call that streams `chunks` and then fails.
pub fn text_then_error(chunks: &[&str], message: &str) -> Vec<StreamEvent> {
    let mut events: Vec<StreamEvent> = chunks
        .iter()
        .map(|c| StreamEvent::Token { text: c.to_string() })
        .collect();
    events.extend(stream_error(message));
    events
}

fn done() -> StreamEvent {
    StreamEvent::Done {
        usage: None,
        finish_reason: Some("stop".into()),
    }
}

// ── ScriptedProvider ────────────────────────────────────────────────

/// Streams one queued script per call; once the queue is empty every call
/// gets the fallback script. Non-streaming calls are guardrail checks and
/// get the configured verdict lines.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Vec<StreamEvent>>>,
    fallback: Vec<StreamEvent>,
    requests: Mutex<Vec<ChatRequest>>,
    input_answer: Mutex<String>,
    output_answer: Mutex<String>,
    guard_calls: AtomicUsize,
    token_delay: Option<Duration>,
    caps: LlmCapabilities,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            fallback: text(&["Happy travels!"]),
            requests: Mutex::new(Vec::new()),
            input_answer: Mutex::new("VERDICT: allowed".into()),
            output_answer: Mutex::new("VERDICT: safe".into()),
            guard_calls: AtomicUsize::new(0),
            token_delay: None,
            caps: LlmCapabilities {
                supports_tools: true,
                supports_streaming: true,
                supports_json_mode: false,
            },
        }
    }

    pub fn with_fallback(mut self, fallback: Vec<StreamEvent>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Advertise a model that cannot call tools.
    pub fn without_tools(mut self) -> Self {
        self.caps.supports_tools = false;
        self
    }

    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = Some(delay);
        self
    }

    pub fn set_guard_answers(&self, input: &str, output: &str) {
        *self.input_answer.lock() = input.into();
        *self.output_answer.lock() = output.into();
    }

    /// Streaming requests seen so far (agent steps).
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    pub fn guard_calls(&self) -> usize {
        self.guard_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.guard_calls.fetch_add(1, Ordering::SeqCst);
        let is_output_check = req.messages.iter().any(|m| {
            matches!(&m.content, MessageContent::Text(t) if t.contains("## Assistant's reply to review"))
        });
        let content = if is_output_check {
            self.output_answer.lock().clone()
        } else {
            self.input_answer.lock().clone()
        };
        Ok(ChatResponse {
            content,
            tool_calls: vec![],
            usage: None,
            model: "guard".into(),
            finish_reason: Some("stop".into()),
        })
    }

    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        self.requests.lock().push(req.clone());
        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        let delay = self.token_delay;

        Ok(Box::pin(async_stream::stream! {
            for event in script {
                if let (Some(d), StreamEvent::Token { .. }) = (delay, &event) {
                    tokio::time::sleep(d).await;
                }
                yield Ok(event);
            }
        }))
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.caps
    }

    fn provider_id(&self) -> &str {
        "fake"
    }
}

// ── FakeTools ───────────────────────────────────────────────────────

/// Records every invocation; answers with a per-tool outcome or `"ok"`.
#[derive(Default)]
pub struct FakeTools {
    calls: Mutex<Vec<(String, Value)>>,
    outcomes: HashMap<String, ToolOutcome>,
}

impl FakeTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(mut self, tool: &str, outcome: ToolOutcome) -> Self {
        self.outcomes.insert(tool.into(), outcome);
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl ToolInvoker for FakeTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        TravelTool::ALL.iter().map(|t| t.definition()).collect()
    }

    async fn invoke(&self, name: &str, args: &Value) -> ToolOutcome {
        self.calls.lock().push((name.to_string(), args.clone()));
        self.outcomes
            .get(name)
            .cloned()
            .unwrap_or_else(|| ToolOutcome::Success("ok".into()))
    }
}

// ── ScriptedGuard ───────────────────────────────────────────────────

/// Fixed verdicts with call counters.
pub struct ScriptedGuard {
    input: Mutex<Verdict>,
    output: Mutex<Verdict>,
    output_delay: Option<Duration>,
    pub input_calls: AtomicUsize,
    pub output_calls: AtomicUsize,
}

impl ScriptedGuard {
    pub fn allow_all() -> Self {
        Self {
            input: Mutex::new(Verdict::Allowed),
            output: Mutex::new(Verdict::Allowed),
            output_delay: None,
            input_calls: AtomicUsize::new(0),
            output_calls: AtomicUsize::new(0),
        }
    }

    pub fn reject_input(self, reason: &str) -> Self {
        *self.input.lock() = Verdict::Rejected(reason.into());
        self
    }

    pub fn reject_output(self, reason: &str) -> Self {
        *self.output.lock() = Verdict::Rejected(reason.into());
        self
    }

    /// Make every output check take `delay`.
    pub fn with_output_delay(mut self, delay: Duration) -> Self {
        self.output_delay = Some(delay);
        self
    }
}

#[async_trait::async_trait]
impl Guardrail for ScriptedGuard {
    async fn check_input(&self, _history: &[Turn], _message: &str) -> Verdict {
        self.input_calls.fetch_add(1, Ordering::SeqCst);
        self.input.lock().clone()
    }

    async fn check_output(&self, _question: &str, _reply: &str) -> Verdict {
        self.output_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.output_delay {
            tokio::time::sleep(delay).await;
        }
        self.output.lock().clone()
    }
}

// ── Wiring ──────────────────────────────────────────────────────────

/// Defaults with rate limiting off so tests can fire freely.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.rate_limit_enabled = false;
    config.llm.default_timeout_ms = 5_000;
    config
}

pub fn registry(provider: Arc<ScriptedProvider>) -> ProviderRegistry {
    ProviderRegistry::new()
        .with_provider("fake", provider)
        .with_role(ROLE_AGENT, "fake/agent-model")
        .with_role(ROLE_GUARDRAIL, "fake/guard-model")
}

/// State with a scripted guardrail in place of the model-backed one.
pub fn state_with_guard(
    config: Config,
    provider: Arc<ScriptedProvider>,
    tools: Arc<FakeTools>,
    guard: Arc<ScriptedGuard>,
) -> AppState {
    AppState::with_guardrail(
        Arc::new(config),
        Arc::new(registry(provider)),
        tools,
        Arc::new(InMemoryConversationStore::new()),
        guard,
    )
}

/// State using the real model-backed guardrail over `provider`.
pub fn state_with_llm_guard(
    config: Config,
    provider: Arc<ScriptedProvider>,
    tools: Arc<FakeTools>,
) -> AppState {
    AppState::new(
        Arc::new(config),
        Arc::new(registry(provider)),
        tools,
        Arc::new(InMemoryConversationStore::new()),
    )
}

/// Run a turn and collect every event until the channel closes.
pub async fn collect_turn(state: &AppState, thread_id: Option<&str>, message: &str) -> Vec<TurnEvent> {
    let mut rx = run_turn(
        state.clone(),
        TurnInput {
            thread_id: thread_id.map(str::to_string),
            message: message.into(),
        },
    );
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

/// Thread id of a turn that ended with `done`.
pub fn done_thread(events: &[TurnEvent]) -> String {
    match events.last() {
        Some(TurnEvent::Done { thread_id }) => thread_id.clone(),
        other => panic!("turn did not end with done: {other:?}"),
    }
}

/// Concatenated `token` text.
pub fn streamed_text(events: &[TurnEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::Token(t) => Some(t.as_str()),
            _ => None,
        })
        .collect()
}

/// Poll until `cond` holds or two seconds pass.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
