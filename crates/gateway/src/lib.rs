//! HTTP gateway, turn runtime and CLI of the travel assistant.

pub mod api;
pub mod app;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
