use std::time::{Duration, Instant};

use serde_json::Value;
use ta_domain::config::ToolsConfig;
use ta_domain::tool::ToolDefinition;

use crate::error::ToolError;
use crate::http::Lookup;
use crate::{country, exchange, holidays, weather, web_search};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of one tool invocation as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Text for the model to read. Includes "not found" answers.
    Success(String),
    /// The lookup could not be completed.
    Failure { tool: String, reason: String },
}

impl ToolOutcome {
    pub fn failure(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolOutcome::Failure {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    /// The observation fed back to the model.
    pub fn observation(&self) -> String {
        match self {
            ToolOutcome::Success(text) => text.clone(),
            ToolOutcome::Failure { tool, reason } => format!(
                "Tool {tool} is unavailable: {reason}. Tell the user this live data could \
                 not be retrieved and do not invent values for it."
            ),
        }
    }
}

/// The seam between the agent engine and the outside world.
///
/// Implementations must never panic or return an error: every problem is a
/// [`ToolOutcome::Failure`].
#[async_trait::async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Tool definitions offered to the model.
    fn definitions(&self) -> Vec<ToolDefinition>;

    async fn invoke(&self, name: &str, args: &Value) -> ToolOutcome;
}

/// The closed set of travel lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TravelTool {
    Weather,
    CountryInfo,
    ExchangeRate,
    PublicHolidays,
    WebSearch,
}

impl TravelTool {
    pub const ALL: [TravelTool; 5] = [
        TravelTool::Weather,
        TravelTool::CountryInfo,
        TravelTool::ExchangeRate,
        TravelTool::PublicHolidays,
        TravelTool::WebSearch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TravelTool::Weather => weather::NAME,
            TravelTool::CountryInfo => country::NAME,
            TravelTool::ExchangeRate => exchange::NAME,
            TravelTool::PublicHolidays => holidays::NAME,
            TravelTool::WebSearch => web_search::NAME,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn definition(self) -> ToolDefinition {
        match self {
            TravelTool::Weather => weather::definition(),
            TravelTool::CountryInfo => country::definition(),
            TravelTool::ExchangeRate => exchange::definition(),
            TravelTool::PublicHolidays => holidays::definition(),
            TravelTool::WebSearch => web_search::definition(),
        }
    }

    async fn call(self, lookup: &Lookup, args: &Value) -> Result<String, ToolError> {
        match self {
            TravelTool::Weather => weather::call(lookup, args).await,
            TravelTool::CountryInfo => country::call(lookup, args).await,
            TravelTool::ExchangeRate => exchange::call(lookup, args).await,
            TravelTool::PublicHolidays => holidays::call(lookup, args).await,
            TravelTool::WebSearch => web_search::call(lookup, args).await,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Production [`ToolInvoker`]: the enabled travel tools over live HTTP.
pub struct ToolRegistry {
    tools: Vec<TravelTool>,
    lookup: Lookup,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn from_config(cfg: &ToolsConfig) -> Result<Self, ToolError> {
        let tools = TravelTool::ALL
            .into_iter()
            .filter(|t| cfg.web_search || *t != TravelTool::WebSearch)
            .collect();
        Ok(Self {
            tools,
            lookup: Lookup::new(cfg)?,
            timeout: Duration::from_millis(cfg.timeout_ms),
        })
    }

    pub fn tools(&self) -> &[TravelTool] {
        &self.tools
    }

    async fn run(&self, tool: TravelTool, args: &Value) -> Result<String, ToolError> {
        match tokio::time::timeout(self.timeout, tool.call(&self.lookup, args)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait::async_trait]
impl ToolInvoker for ToolRegistry {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    async fn invoke(&self, name: &str, args: &Value) -> ToolOutcome {
        let Some(tool) = TravelTool::from_name(name).filter(|t| self.tools.contains(t)) else {
            tracing::warn!(tool = %name, "model requested an unknown tool");
            return ToolOutcome::failure(name, format!("no tool named '{name}'"));
        };

        let started = Instant::now();
        let result = self.run(tool, args).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(text) => {
                tracing::debug!(tool = %name, elapsed_ms, "tool lookup succeeded");
                ToolOutcome::Success(text)
            }
            Err(e) => {
                tracing::warn!(tool = %name, elapsed_ms, error = %e, "tool lookup failed");
                ToolOutcome::failure(name, e.to_string())
            }
        }
    }
}
