use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent turn engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model calls per turn. Reaching it ends the turn with the
    /// text produced so far (or a fixed fallback reply).
    #[serde(default = "d_8")]
    pub max_steps: u32,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Reuse the observation of an identical tool call made earlier in the
    /// same turn instead of calling the external service again.
    #[serde(default = "d_true")]
    pub dedupe_tool_calls: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: d_8(),
            temperature: d_temperature(),
            max_tokens: None,
            dedupe_tool_calls: true,
        }
    }
}

fn d_8() -> u32 {
    8
}
fn d_temperature() -> f32 {
    0.4
}
fn d_true() -> bool {
    true
}
