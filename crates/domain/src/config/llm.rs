use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider system
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Role used by the agent turn engine.
pub const ROLE_AGENT: &str = "agent";
/// Role used by the input/output guardrail classifier.
pub const ROLE_GUARDRAIL: &str = "guardrail";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Request timeout for a single model call (including the full stream).
    #[serde(default = "d_60000u")]
    pub default_timeout_ms: u64,
    /// Startup policy for LLM providers.
    ///
    /// - `allow_none` (default): the server boots even if zero providers
    ///   init; chat endpoints answer 503 until credentials are configured.
    /// - `require_one`: abort startup if no providers successfully init.
    #[serde(default)]
    pub startup_policy: LlmStartupPolicy,
    /// Model roles (`agent`, `guardrail`).
    #[serde(default = "d_roles")]
    pub roles: HashMap<String, RoleConfig>,
    /// Registered LLM providers (data-driven: adding a provider = adding config).
    #[serde(default = "d_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 60_000,
            startup_policy: LlmStartupPolicy::AllowNone,
            roles: d_roles(),
            providers: d_providers(),
        }
    }
}

/// Controls how the server handles LLM provider initialization at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmStartupPolicy {
    #[default]
    AllowNone,
    RequireOne,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Format: "provider_id/model_name". The model name may itself contain
    /// slashes (e.g. `groq/meta-llama/llama-4-scout-17b-16e-instruct`).
    pub model: String,
}

impl RoleConfig {
    /// Split the spec into `(provider_id, model_name)`.
    pub fn split(&self) -> (&str, Option<&str>) {
        split_model_spec(&self.model)
    }
}

/// Split `"provider/model"` at the first slash.
pub fn split_model_spec(spec: &str) -> (&str, Option<&str>) {
    match spec.split_once('/') {
        Some((provider, model)) if !model.is_empty() => (provider, Some(model)),
        Some((provider, _)) => (provider, None),
        None => (spec, None),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default)]
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Any endpoint speaking the OpenAI chat-completions contract
    /// (Groq, OpenAI, Ollama, vLLM, LM Studio, ...).
    #[default]
    OpenaiCompat,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    /// Header name (e.g. "Authorization", "x-api-key").
    #[serde(default)]
    pub header: Option<String>,
    /// Header value prefix (e.g. "Bearer ").
    #[serde(default)]
    pub prefix: Option<String>,
    /// Env var containing the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer env or keychain).
    #[serde(default)]
    pub key: Option<String>,
    /// Keychain service name (e.g., "travel-assistant").
    #[serde(default)]
    pub service: Option<String>,
    /// Keychain account name (e.g., "groq-api-key").
    #[serde(default)]
    pub account: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    ApiKey,
    Keychain,
    /// No credentials (local Ollama / vLLM).
    None,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_60000u() -> u64 {
    60_000
}

fn d_roles() -> HashMap<String, RoleConfig> {
    HashMap::from([
        (
            ROLE_AGENT.to_string(),
            RoleConfig { model: "groq/meta-llama/llama-4-scout-17b-16e-instruct".into() },
        ),
        (
            ROLE_GUARDRAIL.to_string(),
            RoleConfig { model: "groq/llama-3.1-8b-instant".into() },
        ),
    ])
}

fn d_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig {
        id: "groq".into(),
        kind: ProviderKind::OpenaiCompat,
        base_url: "https://api.groq.com/openai/v1".into(),
        auth: AuthConfig {
            env: Some("GROQ_API_KEY".into()),
            ..Default::default()
        },
        default_model: Some("meta-llama/llama-4-scout-17b-16e-instruct".into()),
    }]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
