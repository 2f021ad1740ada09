//! Provider registry.
//!
//! Constructs and holds the configured LLM provider instances. At startup the
//! registry reads the [`LlmConfig`], resolves credentials, and instantiates an
//! adapter per configured provider. Roles (`agent`, `guardrail`) map to a
//! `provider_id/model` spec.

use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;
use ta_domain::config::{
    split_model_spec, LlmConfig, LlmStartupPolicy, ProviderKind, ROLE_AGENT,
};
use ta_domain::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// A provider plus the model it should be asked for.
#[derive(Clone)]
pub struct RoleBinding {
    pub provider: Arc<dyn LlmProvider>,
    /// `None` lets the provider use its default model.
    pub model: Option<String>,
}

impl std::fmt::Debug for RoleBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleBinding")
            .field("provider", &self.provider.provider_id())
            .field("model", &self.model)
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Holds all instantiated LLM providers and role assignments.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    roles: HashMap<String, String>,
}

impl ProviderRegistry {
    /// An empty registry. Chat endpoints answer 503 while it stays empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the application's [`LlmConfig`].
    ///
    /// Providers that fail to initialize (usually a missing API key) are
    /// logged and skipped. With [`LlmStartupPolicy::RequireOne`] an empty
    /// result is an error.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();

        for pc in &config.providers {
            let result: Result<Arc<dyn LlmProvider>> = match pc.kind {
                ProviderKind::OpenaiCompat => {
                    OpenAiCompatProvider::from_config(pc, config.default_timeout_ms)
                        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
            };

            match result {
                Ok(provider) => {
                    tracing::info!(provider_id = %pc.id, kind = ?pc.kind, "registered LLM provider");
                    providers.insert(pc.id.clone(), provider);
                }
                Err(e) => {
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        error = %e,
                        "failed to initialize LLM provider, skipping"
                    );
                }
            }
        }

        if providers.is_empty() {
            if config.startup_policy == LlmStartupPolicy::RequireOne {
                return Err(Error::Config(
                    "no LLM provider could be initialized (startup_policy = require_one)".into(),
                ));
            }
            tracing::warn!("no LLM providers initialized; chat endpoints will answer 503");
        }

        let roles = config
            .roles
            .iter()
            .map(|(name, role)| (name.clone(), role.model.clone()))
            .collect();

        Ok(Self { providers, roles })
    }

    /// Register a provider under `id` (builder style).
    pub fn with_provider(mut self, id: impl Into<String>, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(id.into(), provider);
        self
    }

    /// Assign a `provider_id/model` spec to a role (builder style).
    pub fn with_role(mut self, role: impl Into<String>, spec: impl Into<String>) -> Self {
        self.roles.insert(role.into(), spec.into());
        self
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// Resolve the provider and model for a role.
    ///
    /// A role with no usable assignment falls back to the `agent` role, and
    /// the `agent` role falls back to the first registered provider (by id)
    /// with that provider's default model.
    pub fn for_role(&self, role: &str) -> Option<RoleBinding> {
        if let Some(binding) = self.bound_role(role) {
            return Some(binding);
        }
        if role != ROLE_AGENT {
            if let Some(binding) = self.bound_role(ROLE_AGENT) {
                return Some(binding);
            }
        }
        let first = self.list_providers().into_iter().next()?;
        let provider = self.providers.get(&first)?.clone();
        Some(RoleBinding { provider, model: None })
    }

    fn bound_role(&self, role: &str) -> Option<RoleBinding> {
        let spec = self.roles.get(role)?;
        let (provider_id, model) = split_model_spec(spec);
        let provider = self.providers.get(provider_id)?.clone();
        Some(RoleBinding { provider, model: model.map(String::from) })
    }

    /// The model name assigned to a role (the part after the provider id).
    pub fn model_for_role(&self, role: &str) -> Option<&str> {
        self.roles.get(role).and_then(|spec| split_model_spec(spec).1)
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// List all registered provider IDs (sorted).
    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// List roles and their assigned model specs.
    pub fn list_roles(&self) -> HashMap<String, String> {
        self.roles.clone()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ChatRequest, ChatResponse};
    use ta_domain::capability::LlmCapabilities;
    use ta_domain::config::{AuthConfig, AuthMode, ProviderConfig, ROLE_GUARDRAIL};
    use ta_domain::stream::{BoxStream, StreamEvent};

    struct Named(String, LlmCapabilities);

    #[async_trait::async_trait]
    impl LlmProvider for Named {
        async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
            Err(Error::Other("not used".into()))
        }
        async fn chat_stream(
            &self,
            _req: &ChatRequest,
        ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
            Err(Error::Other("not used".into()))
        }
        fn capabilities(&self) -> &LlmCapabilities {
            &self.1
        }
        fn provider_id(&self) -> &str {
            &self.0
        }
    }

    fn named(id: &str) -> Arc<dyn LlmProvider> {
        Arc::new(Named(id.into(), LlmCapabilities::default()))
    }

    #[test]
    fn role_resolves_provider_and_model() {
        let reg = ProviderRegistry::new()
            .with_provider("groq", named("groq"))
            .with_role(ROLE_AGENT, "groq/meta-llama/llama-4-scout");
        let binding = reg.for_role(ROLE_AGENT).unwrap();
        assert_eq!(binding.provider.provider_id(), "groq");
        assert_eq!(binding.model.as_deref(), Some("meta-llama/llama-4-scout"));
        assert_eq!(reg.model_for_role(ROLE_AGENT), Some("meta-llama/llama-4-scout"));
    }

    #[test]
    fn guardrail_falls_back_to_agent_role() {
        let reg = ProviderRegistry::new()
            .with_provider("groq", named("groq"))
            .with_role(ROLE_AGENT, "groq/big")
            .with_role(ROLE_GUARDRAIL, "missing/small");
        let binding = reg.for_role(ROLE_GUARDRAIL).unwrap();
        assert_eq!(binding.model.as_deref(), Some("big"));
    }

    #[test]
    fn unassigned_agent_uses_first_provider() {
        let reg = ProviderRegistry::new()
            .with_provider("zeta", named("zeta"))
            .with_provider("alpha", named("alpha"));
        let binding = reg.for_role(ROLE_AGENT).unwrap();
        assert_eq!(binding.provider.provider_id(), "alpha");
        assert!(binding.model.is_none());
    }

    #[test]
    fn empty_registry_resolves_nothing() {
        let reg = ProviderRegistry::new().with_role(ROLE_AGENT, "groq/x");
        assert!(reg.is_empty());
        assert!(reg.for_role(ROLE_AGENT).is_none());
    }

    fn unreachable_provider_config() -> LlmConfig {
        LlmConfig {
            providers: vec![ProviderConfig {
                id: "local".into(),
                kind: ProviderKind::OpenaiCompat,
                base_url: "http://127.0.0.1:9/v1".into(),
                auth: AuthConfig {
                    env: Some("TA_TEST_REGISTRY_UNSET_KEY_3141".into()),
                    ..Default::default()
                },
                default_model: Some("m".into()),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn missing_credentials_are_skipped_under_allow_none() {
        let reg = ProviderRegistry::from_config(&unreachable_provider_config()).unwrap();
        assert!(reg.is_empty());
    }

    #[test]
    fn missing_credentials_fail_under_require_one() {
        let mut cfg = unreachable_provider_config();
        cfg.startup_policy = LlmStartupPolicy::RequireOne;
        assert!(ProviderRegistry::from_config(&cfg).is_err());
    }

    #[test]
    fn keyless_local_provider_registers() {
        let mut cfg = unreachable_provider_config();
        cfg.providers[0].auth = AuthConfig { mode: AuthMode::None, ..Default::default() };
        let reg = ProviderRegistry::from_config(&cfg).unwrap();
        assert_eq!(reg.list_providers(), vec!["local".to_string()]);
    }
}
