/// Shared error type used across all travel assistant crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when a provider rejected a malformed tool invocation produced by
    /// the model (Groq reports these as `tool_use_failed`).
    pub fn is_tool_use_failure(&self) -> bool {
        match self {
            Error::Provider { message, .. } => message.contains("tool_use_failed"),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
