pub mod openai_compat;
pub mod registry;
pub mod sse;
pub mod traits;
pub mod util;

// Re-exports for convenience.
pub use registry::{ProviderRegistry, RoleBinding};
pub use traits::{ChatRequest, ChatResponse, LlmProvider};
