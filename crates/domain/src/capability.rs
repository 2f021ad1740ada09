use serde::{Deserialize, Serialize};

/// What a provider's model accepts.
///
/// The engine only offers tool definitions to providers with
/// `supports_tools`; the rest answer from the conversation alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmCapabilities {
    pub supports_tools: bool,
    pub supports_streaming: bool,
    pub supports_json_mode: bool,
}
