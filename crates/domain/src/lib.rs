//! Shared types for the travel assistant crates: errors, provider stream
//! events, conversation messages, trace events and configuration.

pub mod capability;
pub mod config;
pub mod error;
pub mod stream;
pub mod tool;
pub mod trace;
