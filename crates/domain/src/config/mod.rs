mod agent;
mod conversation;
mod guardrails;
mod llm;
mod observability;
mod server;
mod tools;

pub use agent::*;
pub use conversation::*;
pub use guardrails::*;
pub use llm::*;
pub use observability::*;
pub use server::*;
pub use tools::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub guardrails: GuardrailsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { severity: ConfigSeverity::Error, field: field.into(), message: message.into() }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { severity: ConfigSeverity::Warning, field: field.into(), message: message.into() }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError::error("server.port", "port must be greater than 0"));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }
        if self.server.max_body_bytes == 0 {
            errors.push(ConfigError::error(
                "server.max_body_bytes",
                "max_body_bytes must be greater than 0",
            ));
        }
        if self.server.rate_limit_enabled
            && (self.server.rate_limit.replenish_every_ms == 0
                || self.server.rate_limit.burst_size == 0)
        {
            errors.push(ConfigError::error(
                "server.rate_limit",
                "replenish_every_ms and burst_size must be greater than 0",
            ));
        }

        // CORS: warn if wildcard is used.
        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        if self.llm.providers.is_empty() {
            errors.push(ConfigError::warning("llm.providers", "no LLM providers configured"));
        }
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].id"),
                    "provider id must not be empty",
                ));
            }
            if provider.base_url.is_empty() {
                errors.push(ConfigError::error(
                    format!("llm.providers[{i}].base_url"),
                    "provider base_url must not be empty",
                ));
            }
        }

        // Roles should point at a configured provider.
        let mut role_names: Vec<&String> = self.llm.roles.keys().collect();
        role_names.sort();
        for role in role_names {
            let (provider_id, _) = self.llm.roles[role].split();
            if !self.llm.providers.iter().any(|p| p.id == provider_id) {
                errors.push(ConfigError::warning(
                    format!("llm.roles.{role}"),
                    format!("references unknown provider \"{provider_id}\""),
                ));
            }
        }
        if !self.llm.roles.contains_key(ROLE_AGENT) {
            errors.push(ConfigError::warning(
                "llm.roles.agent",
                "no agent role; the first registered provider will be used",
            ));
        }

        if self.agent.max_steps == 0 {
            errors.push(ConfigError::error("agent.max_steps", "max_steps must be at least 1"));
        }
        if self.tools.timeout_ms == 0 {
            errors.push(ConfigError::error("tools.timeout_ms", "timeout_ms must be greater than 0"));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has(issues: &[ConfigError], field: &str, severity: ConfigSeverity) -> bool {
        issues.iter().any(|i| i.field == field && i.severity == severity)
    }

    #[test]
    fn default_config_is_valid() {
        let issues = Config::default().validate();
        assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    }

    #[test]
    fn zero_steps_is_an_error() {
        let mut cfg = Config::default();
        cfg.agent.max_steps = 0;
        assert!(has(&cfg.validate(), "agent.max_steps", ConfigSeverity::Error));
    }

    #[test]
    fn zero_rate_limit_is_an_error_only_when_enabled() {
        let mut cfg = Config::default();
        cfg.server.rate_limit.burst_size = 0;
        assert!(has(&cfg.validate(), "server.rate_limit", ConfigSeverity::Error));

        cfg.server.rate_limit_enabled = false;
        assert!(!has(&cfg.validate(), "server.rate_limit", ConfigSeverity::Error));
    }

    #[test]
    fn role_with_unknown_provider_warns() {
        let mut cfg = Config::default();
        cfg.llm.roles.insert(
            ROLE_GUARDRAIL.into(),
            RoleConfig { model: "nowhere/tiny".into() },
        );
        assert!(has(&cfg.validate(), "llm.roles.guardrail", ConfigSeverity::Warning));
    }

    #[test]
    fn display_formats_severity_tag() {
        let issue = ConfigError::error("server.port", "port must be greater than 0");
        assert_eq!(issue.to_string(), "[ERROR] server.port: port must be greater than 0");
    }
}
