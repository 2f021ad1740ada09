use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Guardrails (input / output checks)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailsConfig {
    /// When false, every input and output is allowed without a model call.
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// What to do when the classifier call itself fails.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Prior messages (user + assistant) shown to the input check.
    #[serde(default = "d_6")]
    pub history_turns: usize,
    /// Each history message is cut to this many characters.
    #[serde(default = "d_200")]
    pub history_truncate_chars: usize,
    #[serde(default)]
    pub temperature: f32,
}

impl Default for GuardrailsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_policy: FailurePolicy::FailClosed,
            history_turns: d_6(),
            history_truncate_chars: d_200(),
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Treat a failed check as a rejection.
    #[default]
    FailClosed,
    /// Treat a failed check as a pass.
    FailOpen,
}

fn d_true() -> bool {
    true
}
fn d_6() -> usize {
    6
}
fn d_200() -> usize {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fail_closed() {
        let cfg: GuardrailsConfig = toml::from_str("").unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.failure_policy, FailurePolicy::FailClosed);
        assert_eq!(cfg.history_turns, 6);
        assert_eq!(cfg.history_truncate_chars, 200);
    }

    #[test]
    fn fail_open_parses() {
        let cfg: GuardrailsConfig = toml::from_str(r#"failure_policy = "fail_open""#).unwrap();
        assert_eq!(cfg.failure_policy, FailurePolicy::FailOpen);
    }
}
