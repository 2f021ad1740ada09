//! `travel-assistant run`: one turn from the command line.
//!
//! Streams the reply to stdout and exits. Useful for scripting and for
//! trying a configuration without starting the server.

use std::io::Write;
use std::sync::Arc;

use ta_domain::config::Config;

use crate::bootstrap;
use crate::runtime::{run_turn, TurnEvent, TurnInput};

/// Execute a single turn and print the reply.
///
/// Returns `Ok(false)` when the turn ended with an error event.
pub async fn run(
    config: Arc<Config>,
    message: String,
    thread_id: Option<String>,
    json_output: bool,
) -> anyhow::Result<bool> {
    let state = bootstrap::build_app_state(config)?;
    if state.llm.is_empty() {
        anyhow::bail!("no LLM provider is available; check [llm.providers] and API keys");
    }

    let mut rx = run_turn(state, TurnInput { thread_id, message });

    let mut ok = true;
    let mut collected: Vec<TurnEvent> = Vec::new();

    while let Some(event) = rx.recv().await {
        if let TurnEvent::Error(_) = &event {
            ok = false;
        }
        if json_output {
            collected.push(event);
            continue;
        }
        match event {
            TurnEvent::Token(text) => {
                print!("{text}");
                std::io::stdout().flush().ok();
            }
            TurnEvent::Replace(text) => {
                // Tokens already on the terminal cannot be unprinted.
                println!("\n\x1b[2m[reply replaced]\x1b[0m");
                print!("{text}");
            }
            TurnEvent::Done { thread_id } => {
                println!();
                eprintln!("\x1b[2mthread: {thread_id}\x1b[0m");
            }
            TurnEvent::Error(message) => {
                println!();
                eprintln!("error: {message}");
            }
        }
    }

    if json_output {
        let json = serde_json::to_string_pretty(&collected)?;
        println!("{json}");
    }

    Ok(ok)
}
