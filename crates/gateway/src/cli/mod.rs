pub mod config;
pub mod run;

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};

use ta_domain::config::Config;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "TA_CONFIG";

/// Travel assistant: a tool-augmented travel planning chat service.
#[derive(Debug, Parser)]
#[command(name = "travel-assistant", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Send a single message and print the reply.
    Run {
        /// The message to send.
        message: String,
        /// Thread to continue (only meaningful within one process).
        #[arg(long)]
        thread: Option<String>,
        /// Print the turn's events as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any issues.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `TA_CONFIG` (or `config.toml`
/// by default). Returns the parsed [`Config`] and the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(Path::new(&config_path))?;
    Ok((config, config_path))
}

/// Parse `path`, or fall back to defaults when the file does not exist.
pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
