//! Core runtime: the turn pipeline and the pieces it coordinates.
//!
//! Entry point: [`run_turn`] takes a thread id + user message and returns a
//! stream of [`TurnEvent`]s suitable for SSE or non-streaming aggregation.

pub mod cancel;
pub mod engine;
pub mod guardrail;
pub mod prompts;
pub mod session_lock;
pub mod turn;

pub use turn::{run_turn, TurnEvent, TurnInput};
