/// Why a single tool invocation failed.
///
/// Never escapes the crate as an `Err`: the registry folds every variant into
/// [`ToolOutcome::Failure`](crate::ToolOutcome::Failure).
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("{service} unreachable: {message}")]
    Transport { service: &'static str, message: String },

    #[error("{service} answered HTTP {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service} returned an unreadable response: {message}")]
    Decode { service: &'static str, message: String },
}

impl ToolError {
    pub(crate) fn transport(service: &'static str, e: reqwest::Error) -> Self {
        ToolError::Transport {
            service,
            message: e.to_string(),
        }
    }

    pub(crate) fn decode(service: &'static str, message: impl std::fmt::Display) -> Self {
        ToolError::Decode {
            service,
            message: message.to_string(),
        }
    }
}

/// Deserialize the model-supplied arguments into a typed struct.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(
    args: &serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}
