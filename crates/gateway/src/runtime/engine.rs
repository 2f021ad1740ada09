//! The agent turn engine: a bounded reason / act / observe loop.
//!
//! The loop is an explicit state machine. Every model call costs one step;
//! reaching `agent.max_steps` ends the turn with whatever text was already
//! streamed. Tool calls are internal: they produce no client events, only
//! observations appended to the working context.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use serde_json::Value;
use tracing::Instrument;

use ta_domain::config::{AgentConfig, ROLE_AGENT};
use ta_domain::error::{Error, Result};
use ta_domain::stream::{StreamEvent, Usage};
use ta_domain::tool::{Message, ToolCall, ToolDefinition};
use ta_domain::trace::TraceEvent;
use ta_providers::{ChatRequest, RoleBinding};
use ta_sessions::Turn;
use ta_tools::{ToolInvoker, ToolOutcome};

use super::cancel::CancelToken;
use super::prompts::AGENT_SYSTEM_PROMPT;
use super::turn::EventSink;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    /// The model gave a final answer. Carries the full streamed reply.
    Completed(String),
    /// The step budget ran out. Carries the text streamed so far (may be empty).
    StepLimit(String),
    /// The turn's cancel token fired.
    Cancelled,
    /// A model call failed. The message is for logs only.
    Failed(String),
}

impl EngineOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            EngineOutcome::Completed(_) => "completed",
            EngineOutcome::StepLimit(_) => "step_limit",
            EngineOutcome::Cancelled => "cancelled",
            EngineOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug)]
pub struct EngineRun {
    pub outcome: EngineOutcome,
    pub steps: u32,
    pub tool_calls: u32,
}

enum State {
    Reasoning,
    AwaitingTool(Vec<ToolCall>),
    Responding,
    Done,
    Failed(String),
}

/// What one model call produced.
enum Step {
    Finished { tool_calls: Vec<ToolCall> },
    Cancelled,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Engine<'a> {
    binding: RoleBinding,
    tools: &'a dyn ToolInvoker,
    config: &'a AgentConfig,
    llm_timeout: Duration,
}

impl<'a> Engine<'a> {
    pub fn new(
        binding: RoleBinding,
        tools: &'a dyn ToolInvoker,
        config: &'a AgentConfig,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            binding,
            tools,
            config,
            llm_timeout,
        }
    }

    /// Run the loop over `messages` (system prompt, history, new message).
    ///
    /// Reply tokens go to `sink` as they arrive. The returned reply text is
    /// exactly the concatenation of those tokens.
    pub async fn run(
        &self,
        mut messages: Vec<Message>,
        sink: &EventSink,
        cancel: &CancelToken,
    ) -> EngineRun {
        let definitions = if self.binding.provider.capabilities().supports_tools {
            self.tools.definitions()
        } else {
            Vec::new()
        };
        let mut cache: HashMap<String, ToolOutcome> = HashMap::new();
        let mut reply = String::new();
        let mut steps: u32 = 0;
        let mut tool_calls: u32 = 0;
        let mut state = State::Reasoning;

        let outcome = loop {
            if cancel.is_cancelled() {
                break EngineOutcome::Cancelled;
            }

            state = match state {
                State::Reasoning => {
                    if steps >= self.config.max_steps {
                        tracing::warn!(steps, "step budget exhausted");
                        break EngineOutcome::StepLimit(reply);
                    }
                    steps += 1;

                    let mut text = String::new();
                    match self.step(&messages, &definitions, steps, sink, cancel, &mut text).await {
                        Ok(Step::Cancelled) => break EngineOutcome::Cancelled,
                        Ok(Step::Finished { tool_calls: calls }) => {
                            reply.push_str(&text);
                            if calls.is_empty() {
                                State::Responding
                            } else if steps >= self.config.max_steps {
                                // No model call would read these results.
                                tracing::warn!(steps, "step budget exhausted, tool calls skipped");
                                break EngineOutcome::StepLimit(reply);
                            } else {
                                messages.push(Message::assistant_tool_calls(&text, &calls));
                                State::AwaitingTool(calls)
                            }
                        }
                        Err(e) => State::Failed(e.to_string()),
                    }
                }
                State::AwaitingTool(calls) => {
                    tool_calls += calls.len() as u32;
                    let observed = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break EngineOutcome::Cancelled,
                        observed = self.run_tools(&calls, &mut cache) => observed,
                    };
                    for (call_id, outcome) in observed {
                        messages.push(Message::tool_result(call_id, outcome.observation()));
                    }
                    State::Reasoning
                }
                State::Responding => {
                    if reply.trim().is_empty() {
                        State::Failed("model returned an empty reply".into())
                    } else {
                        State::Done
                    }
                }
                State::Done => break EngineOutcome::Completed(reply),
                State::Failed(message) => break EngineOutcome::Failed(message),
            };
        };

        EngineRun {
            outcome,
            steps,
            tool_calls,
        }
    }

    /// One model call, retried once without tools when the provider
    /// rejects a malformed tool invocation.
    ///
    /// Every streamed token lands in `text`, including tokens of a failed
    /// first attempt, so the reply stays equal to what the client saw.
    async fn step(
        &self,
        messages: &[Message],
        definitions: &[ToolDefinition],
        step: u32,
        sink: &EventSink,
        cancel: &CancelToken,
        text: &mut String,
    ) -> Result<Step> {
        match self.call_model(messages, definitions, step, sink, cancel, text).await {
            Err(e) if !definitions.is_empty() && e.is_tool_use_failure() => {
                tracing::warn!(
                    step,
                    streamed = text.len(),
                    error = %e,
                    "malformed tool call, retrying without tools"
                );
                self.call_model(messages, &[], step, sink, cancel, text).await
            }
            other => other,
        }
    }

    async fn call_model(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        step: u32,
        sink: &EventSink,
        cancel: &CancelToken,
        text: &mut String,
    ) -> Result<Step> {
        let provider = &self.binding.provider;
        let offer_tools = !tools.is_empty();
        let req = ChatRequest {
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_tokens,
            json_mode: false,
            model: self.binding.model.clone(),
        };
        let span = tracing::info_span!(
            "llm.call",
            provider = %provider.provider_id(),
            model = self.binding.model.as_deref().unwrap_or("default"),
            step,
            tools = offer_tools,
        );

        let call = async {
            let started = Instant::now();
            let mut stream = provider.chat_stream(&req).await?;
            let mut tool_calls = Vec::new();
            let mut usage: Option<Usage> = None;

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(Step::Cancelled),
                    next = stream.next() => next,
                };
                let Some(event) = next else { break };
                match event? {
                    StreamEvent::Token { text: chunk } => {
                        if !chunk.is_empty() {
                            sink.token(&chunk).await;
                            text.push_str(&chunk);
                        }
                    }
                    StreamEvent::ToolCallStarted { call_id, tool_name } => {
                        tracing::debug!(%call_id, %tool_name, "model is calling a tool");
                    }
                    StreamEvent::ToolCallDelta { .. } => {}
                    StreamEvent::ToolCallFinished {
                        call_id,
                        tool_name,
                        arguments,
                    } => tool_calls.push(ToolCall {
                        call_id,
                        tool_name,
                        arguments,
                    }),
                    StreamEvent::Done { usage: u, .. } => {
                        usage = u;
                        break;
                    }
                    StreamEvent::Error { message } => {
                        return Err(Error::Provider {
                            provider: provider.provider_id().to_string(),
                            message,
                        });
                    }
                }
            }

            TraceEvent::LlmRequest {
                provider: provider.provider_id().to_string(),
                model: self.binding.model.clone().unwrap_or_default(),
                role: ROLE_AGENT.into(),
                streaming: true,
                duration_ms: started.elapsed().as_millis() as u64,
                prompt_tokens: usage.as_ref().map(|u| u.prompt_tokens),
                completion_tokens: usage.as_ref().map(|u| u.completion_tokens),
            }
            .emit();

            Ok(Step::Finished { tool_calls })
        }
        .instrument(span);

        match tokio::time::timeout(self.llm_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "model call exceeded {} ms",
                self.llm_timeout.as_millis()
            ))),
        }
    }

    /// Invoke a batch of tool calls concurrently.
    ///
    /// With de-duplication on, a call whose tool and canonical arguments
    /// match an earlier call of this turn reuses that observation.
    async fn run_tools(
        &self,
        calls: &[ToolCall],
        cache: &mut HashMap<String, ToolOutcome>,
    ) -> Vec<(String, ToolOutcome)> {
        let dedupe = self.config.dedupe_tool_calls;
        let keys: Vec<String> = calls
            .iter()
            .map(|c| cache_key(&c.tool_name, &c.arguments))
            .collect();

        let mut fresh: Vec<usize> = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            let seen = dedupe && (cache.contains_key(key) || fresh.iter().any(|&j| keys[j] == *key));
            if !seen {
                fresh.push(i);
            }
        }

        let results =
            futures_util::future::join_all(fresh.iter().map(|&i| self.invoke_one(&calls[i]))).await;
        let mut batch: HashMap<usize, ToolOutcome> = fresh.into_iter().zip(results).collect();

        calls
            .iter()
            .enumerate()
            .map(|(i, call)| {
                let outcome = match batch.remove(&i) {
                    Some(outcome) => {
                        if dedupe {
                            cache.insert(keys[i].clone(), outcome.clone());
                        }
                        outcome
                    }
                    None => {
                        let outcome = cache.get(&keys[i]).cloned().unwrap_or_else(|| {
                            ToolOutcome::failure(&call.tool_name, "no result recorded")
                        });
                        TraceEvent::ToolInvoked {
                            tool_name: call.tool_name.clone(),
                            ok: outcome.is_success(),
                            cached: true,
                            duration_ms: 0,
                        }
                        .emit();
                        outcome
                    }
                };
                (call.call_id.clone(), outcome)
            })
            .collect()
    }

    async fn invoke_one(&self, call: &ToolCall) -> ToolOutcome {
        let span = tracing::info_span!(
            "tool.call",
            tool = %call.tool_name,
            call_id = %call.call_id,
        );
        async {
            let started = Instant::now();
            let outcome = self.tools.invoke(&call.tool_name, &call.arguments).await;
            TraceEvent::ToolInvoked {
                tool_name: call.tool_name.clone(),
                ok: outcome.is_success(),
                cached: false,
                duration_ms: started.elapsed().as_millis() as u64,
            }
            .emit();
            outcome
        }
        .instrument(span)
        .await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// System prompt, prior turns, then the new user message.
pub fn build_messages(history: &[Turn], user_message: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(Message::system(AGENT_SYSTEM_PROMPT));
    for turn in history {
        messages.push(Message::user(&turn.user));
        messages.push(Message::assistant(&turn.assistant));
    }
    messages.push(Message::user(user_message));
    messages
}

/// De-dup key: tool name plus arguments with string values trimmed and
/// lowercased. Object keys serialize sorted, so key order does not matter.
fn cache_key(tool_name: &str, args: &Value) -> String {
    format!("{tool_name}:{}", canonical(args))
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_lowercase()),
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonical(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
