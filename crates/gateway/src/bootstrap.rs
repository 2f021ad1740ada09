//! AppState construction shared by `serve` and `run`.

use std::sync::Arc;

use anyhow::Context;

use ta_domain::config::{Config, ConfigSeverity};
use ta_providers::ProviderRegistry;
use ta_sessions::InMemoryConversationStore;
use ta_tools::ToolRegistry;

use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let error_count = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if error_count > 0 {
        anyhow::bail!("config validation failed with {error_count} error(s)");
    }

    // ── LLM providers ────────────────────────────────────────────────
    let llm = Arc::new(
        ProviderRegistry::from_config(&config.llm).context("initializing LLM providers")?,
    );
    if !llm.is_empty() {
        tracing::info!(
            providers = ?llm.list_providers(),
            roles = ?llm.list_roles(),
            "LLM providers ready"
        );
    }

    // ── Tools ────────────────────────────────────────────────────────
    let tools = ToolRegistry::from_config(&config.tools).context("initializing tools")?;
    tracing::info!(
        tools = ?tools.tools().iter().map(|t| t.name()).collect::<Vec<_>>(),
        timeout_ms = config.tools.timeout_ms,
        "tools ready"
    );

    // ── Conversation store ───────────────────────────────────────────
    let store = Arc::new(InMemoryConversationStore::new());

    tracing::info!(
        guardrails = config.guardrails.enabled,
        failure_policy = ?config.guardrails.failure_policy,
        on_disconnect = ?config.conversation.on_disconnect,
        max_steps = config.agent.max_steps,
        "turn pipeline configured"
    );

    Ok(AppState::new(config, llm, Arc::new(tools), store))
}
