//! Input and output checks applied around the agent engine.
//!
//! Both checks are one non-streaming call to the `guardrail` model role that
//! must answer with a single `VERDICT:` line. When the call itself fails the
//! configured [`FailurePolicy`] decides the verdict.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use regex::Regex;

use ta_domain::config::{FailurePolicy, GuardrailsConfig, ROLE_GUARDRAIL};
use ta_domain::error::{Error, Result};
use ta_domain::tool::Message;
use ta_domain::trace::TraceEvent;
use ta_providers::{ChatRequest, ProviderRegistry};
use ta_sessions::Turn;

use super::prompts::{INPUT_GUARD_PROMPT, OUTPUT_GUARD_PROMPT};

/// Classifier answers are a single line; cap the completion accordingly.
const VERDICT_MAX_TOKENS: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Rejected(String),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Input,
    Output,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Output => "output",
        }
    }

    fn reject_word(self) -> &'static str {
        match self {
            Stage::Input => "blocked",
            Stage::Output => "unsafe",
        }
    }
}

/// The two checkpoints a turn passes through.
#[async_trait::async_trait]
pub trait Guardrail: Send + Sync {
    /// Classify the new user message, given the thread's prior turns.
    async fn check_input(&self, history: &[Turn], message: &str) -> Verdict;

    /// Classify the composed reply to `question`.
    async fn check_output(&self, question: &str, reply: &str) -> Verdict;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM-backed guardrail
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct LlmGuardrail {
    llm: Arc<ProviderRegistry>,
    config: GuardrailsConfig,
}

impl LlmGuardrail {
    pub fn new(llm: Arc<ProviderRegistry>, config: GuardrailsConfig) -> Self {
        Self { llm, config }
    }

    async fn run(&self, stage: Stage, system: &str, content: String) -> Verdict {
        if !self.config.enabled {
            return Verdict::Allowed;
        }

        let (verdict, policy_applied) = match self.classify(system, content).await {
            Ok(answer) => (parse_verdict(&answer, stage), false),
            Err(e) => {
                tracing::warn!(
                    stage = stage.as_str(),
                    error = %e,
                    policy = ?self.config.failure_policy,
                    "guardrail check failed, applying failure policy"
                );
                let verdict = match self.config.failure_policy {
                    FailurePolicy::FailClosed => {
                        Verdict::Rejected("guardrail unavailable".into())
                    }
                    FailurePolicy::FailOpen => Verdict::Allowed,
                };
                (verdict, true)
            }
        };

        TraceEvent::GuardrailVerdict {
            stage: stage.as_str().into(),
            allowed: verdict.is_allowed(),
            reason: match &verdict {
                Verdict::Rejected(reason) => Some(reason.clone()),
                Verdict::Allowed => None,
            },
            policy_applied,
        }
        .emit();

        verdict
    }

    async fn classify(&self, system: &str, content: String) -> Result<String> {
        let binding = self
            .llm
            .for_role(ROLE_GUARDRAIL)
            .ok_or_else(|| Error::Config("no provider for the guardrail role".into()))?;

        let req = ChatRequest {
            messages: vec![Message::system(system), Message::user(content)],
            temperature: Some(self.config.temperature),
            max_tokens: Some(VERDICT_MAX_TOKENS),
            model: binding.model.clone(),
            ..Default::default()
        };

        let started = Instant::now();
        let resp = binding.provider.chat(&req).await?;

        TraceEvent::LlmRequest {
            provider: binding.provider.provider_id().to_string(),
            model: resp.model.clone(),
            role: ROLE_GUARDRAIL.into(),
            streaming: false,
            duration_ms: started.elapsed().as_millis() as u64,
            prompt_tokens: resp.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: resp.usage.as_ref().map(|u| u.completion_tokens),
        }
        .emit();

        Ok(resp.content)
    }
}

#[async_trait::async_trait]
impl Guardrail for LlmGuardrail {
    async fn check_input(&self, history: &[Turn], message: &str) -> Verdict {
        let summary = history_summary(
            history,
            self.config.history_turns,
            self.config.history_truncate_chars,
        );
        let content = if summary.is_empty() {
            format!("## Latest user message to classify\n{message}")
        } else {
            format!(
                "## Recent conversation history\n{summary}\n\n\
                 ## Latest user message to classify\n{message}"
            )
        };
        self.run(Stage::Input, INPUT_GUARD_PROMPT, content).await
    }

    async fn check_output(&self, question: &str, reply: &str) -> Verdict {
        let content =
            format!("## User's question\n{question}\n\n## Assistant's reply to review\n{reply}");
        self.run(Stage::Output, OUTPUT_GUARD_PROMPT, content).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn verdict_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)VERDICT:\s*(allowed|blocked|safe|unsafe)\b(?:\s*\|\s*([^\n]*))?")
            .expect("verdict pattern is valid")
    })
}

/// Read a classifier answer.
///
/// A `VERDICT:` line wins; without one, the presence of the stage's reject
/// word (`blocked` / `unsafe`) decides.
pub fn parse_verdict(answer: &str, stage: Stage) -> Verdict {
    if let Some(caps) = verdict_regex().captures(answer) {
        let word = caps[1].to_ascii_lowercase();
        if word == "allowed" || word == "safe" {
            return Verdict::Allowed;
        }
        let reason = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| word.clone());
        return Verdict::Rejected(reason);
    }

    if answer.to_ascii_lowercase().contains(stage.reject_word()) {
        let reason = answer
            .split_once('|')
            .map(|(_, r)| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| stage.reject_word().to_string());
        return Verdict::Rejected(reason);
    }

    Verdict::Allowed
}

/// Render the last `max_messages` prior messages as `User:` / `Assistant:`
/// lines. Empty when there is no history.
pub fn history_summary(history: &[Turn], max_messages: usize, truncate_chars: usize) -> String {
    let messages: Vec<(&str, &str)> = history
        .iter()
        .flat_map(|t| [("User", t.user.as_str()), ("Assistant", t.assistant.as_str())])
        .collect();
    let start = messages.len().saturating_sub(max_messages);

    messages[start..]
        .iter()
        .map(|(role, text)| format!("{role}: {}", truncate(text, truncate_chars)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
