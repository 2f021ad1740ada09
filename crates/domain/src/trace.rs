use serde::Serialize;

/// Structured trace events emitted across the travel assistant crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionResolved {
        session_id: String,
        is_new: bool,
        prior_turns: usize,
    },
    TurnAppended {
        session_id: String,
        turns: usize,
    },
    GuardrailVerdict {
        stage: String,
        allowed: bool,
        reason: Option<String>,
        /// True when the verdict came from the failure policy rather than
        /// from the classifier.
        policy_applied: bool,
    },
    ToolInvoked {
        tool_name: String,
        ok: bool,
        cached: bool,
        duration_ms: u64,
    },
    LlmRequest {
        provider: String,
        model: String,
        role: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    TurnFinished {
        session_id: String,
        outcome: String,
        steps: u32,
        tool_calls: u32,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ta_event");
    }
}
