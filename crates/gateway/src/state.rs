use std::sync::Arc;

use ta_domain::config::Config;
use ta_providers::ProviderRegistry;
use ta_sessions::ConversationStore;
use ta_tools::ToolInvoker;

use crate::runtime::cancel::CancelMap;
use crate::runtime::guardrail::{Guardrail, LlmGuardrail};
use crate::runtime::session_lock::SessionLockMap;

/// Shared application state passed to all API handlers and turns.
///
/// Fields are grouped by concern:
/// - **Core services**: config, LLM providers, tools
/// - **Conversation**: store, guardrail
/// - **Runtime**: per-thread locks and cancel tokens
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub llm: Arc<ProviderRegistry>,
    pub tools: Arc<dyn ToolInvoker>,

    // ── Conversation ──────────────────────────────────────────────────
    pub store: Arc<dyn ConversationStore>,
    pub guardrail: Arc<dyn Guardrail>,

    // ── Runtime ───────────────────────────────────────────────────────
    /// Serializes turns of the same thread.
    pub session_locks: Arc<SessionLockMap>,
    /// Cancel tokens of running turns, keyed by thread id.
    pub cancel_map: Arc<CancelMap>,
}

impl AppState {
    /// Wire the state with the LLM-backed guardrail.
    pub fn new(
        config: Arc<Config>,
        llm: Arc<ProviderRegistry>,
        tools: Arc<dyn ToolInvoker>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        let guardrail = Arc::new(LlmGuardrail::new(llm.clone(), config.guardrails.clone()));
        Self::with_guardrail(config, llm, tools, store, guardrail)
    }

    pub fn with_guardrail(
        config: Arc<Config>,
        llm: Arc<ProviderRegistry>,
        tools: Arc<dyn ToolInvoker>,
        store: Arc<dyn ConversationStore>,
        guardrail: Arc<dyn Guardrail>,
    ) -> Self {
        Self {
            config,
            llm,
            tools,
            store,
            guardrail,
            session_locks: Arc::new(SessionLockMap::new()),
            cancel_map: Arc::new(CancelMap::new()),
        }
    }
}
