//! Conversation history for the travel assistant.
//!
//! Maps an opaque thread id to its ordered turns. The store is injected into
//! the gateway behind the [`ConversationStore`] trait; the in-memory
//! implementation keeps one lock per thread so unrelated threads never
//! contend.

pub mod store;

pub use store::{ConversationStore, InMemoryConversationStore, Resolved, Turn};
