use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Travel lookup tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// External lookups offered to the agent. All services are key-less.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Per-invocation budget, covering every HTTP request the tool makes.
    #[serde(default = "d_10000")]
    pub timeout_ms: u64,
    /// Nominatim requires an identifying User-Agent.
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
    /// Offer the `web_search` tool.
    #[serde(default = "d_true")]
    pub web_search: bool,
    #[serde(default)]
    pub endpoints: ToolEndpoints,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: d_10000(),
            user_agent: d_user_agent(),
            web_search: true,
            endpoints: ToolEndpoints::default(),
        }
    }
}

/// Base URLs of the lookup services (no trailing slash).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEndpoints {
    #[serde(default = "d_geocoding")]
    pub geocoding_url: String,
    #[serde(default = "d_weather")]
    pub weather_url: String,
    #[serde(default = "d_countries")]
    pub countries_url: String,
    #[serde(default = "d_exchange")]
    pub exchange_url: String,
    #[serde(default = "d_holidays")]
    pub holidays_url: String,
    #[serde(default = "d_web_search")]
    pub web_search_url: String,
}

impl Default for ToolEndpoints {
    fn default() -> Self {
        Self {
            geocoding_url: d_geocoding(),
            weather_url: d_weather(),
            countries_url: d_countries(),
            exchange_url: d_exchange(),
            holidays_url: d_holidays(),
            web_search_url: d_web_search(),
        }
    }
}

impl ToolEndpoints {
    /// Point every service at one base URL (mock servers, proxies).
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            geocoding_url: base.clone(),
            weather_url: base.clone(),
            countries_url: base.clone(),
            exchange_url: base.clone(),
            holidays_url: base.clone(),
            web_search_url: base,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_10000() -> u64 {
    10_000
}
fn d_user_agent() -> String {
    "TravelAssistant/1.0".into()
}
fn d_true() -> bool {
    true
}
fn d_geocoding() -> String {
    "https://nominatim.openstreetmap.org".into()
}
fn d_weather() -> String {
    "https://api.open-meteo.com".into()
}
fn d_countries() -> String {
    "https://restcountries.com".into()
}
fn d_exchange() -> String {
    "https://api.frankfurter.app".into()
}
fn d_holidays() -> String {
    "https://date.nager.at".into()
}
fn d_web_search() -> String {
    "https://api.duckduckgo.com".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_override_keeps_other_defaults() {
        let toml_str = r#"
            timeout_ms = 2500

            [endpoints]
            exchange_url = "http://rates.internal"
        "#;
        let cfg: ToolsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.timeout_ms, 2500);
        assert_eq!(cfg.endpoints.exchange_url, "http://rates.internal");
        assert_eq!(cfg.endpoints.weather_url, "https://api.open-meteo.com");
    }

    #[test]
    fn all_at_strips_trailing_slash() {
        let endpoints = ToolEndpoints::all_at("http://127.0.0.1:9999/");
        assert_eq!(endpoints.holidays_url, "http://127.0.0.1:9999");
        assert_eq!(endpoints.web_search_url, "http://127.0.0.1:9999");
    }
}
