use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_8000")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Largest accepted request body for the chat endpoints, in bytes.
    /// Larger bodies are rejected with 413 before a turn starts.
    #[serde(default = "d_max_body")]
    pub max_body_bytes: usize,
    /// Global in-flight request cap (backpressure).
    #[serde(default = "d_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Per-IP rate limiting on the chat endpoints. `/health` is never limited.
    #[serde(default = "d_true")]
    pub rate_limit_enabled: bool,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "127.0.0.1".into(),
            cors: CorsConfig::default(),
            max_body_bytes: d_max_body(),
            max_concurrent_requests: d_max_concurrent(),
            rate_limit_enabled: true,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Per-IP token-bucket rate limiting configuration.
///
/// One request token is added every `replenish_every_ms`; a client can send
/// `burst_size` requests back to back before being throttled. The defaults
/// allow 20 chat requests per minute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "d_replenish_ms")]
    pub replenish_every_ms: u64,
    #[serde(default = "d_burst")]
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            replenish_every_ms: d_replenish_ms(),
            burst_size: d_burst(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS. Use `["*"]` for permissive (NOT recommended).
    /// Defaults to localhost-only, any port.
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_8000() -> u16 {
    8000
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_max_body() -> usize {
    10_000
}
fn d_max_concurrent() -> usize {
    256
}
fn d_true() -> bool {
    true
}
fn d_replenish_ms() -> u64 {
    3_000
}
fn d_burst() -> u32 {
    20
}
fn d_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:*".into(),
        "http://127.0.0.1:*".into(),
    ]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_default_limits_twenty_per_minute() {
        let cfg = ServerConfig::default();
        assert!(cfg.rate_limit_enabled);
        assert_eq!(cfg.rate_limit.burst_size, 20);
        assert_eq!(cfg.rate_limit.replenish_every_ms * 20, 60_000);
    }

    #[test]
    fn server_config_parses_without_rate_limit_table() {
        let toml_str = r#"
            port = 8080
            host = "0.0.0.0"
        "#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.rate_limit.burst_size, 20);
    }

    #[test]
    fn server_config_parses_custom_rate_limit() {
        let toml_str = r#"
            rate_limit_enabled = true

            [rate_limit]
            replenish_every_ms = 500
            burst_size = 5
        "#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.rate_limit.replenish_every_ms, 500);
        assert_eq!(cfg.rate_limit.burst_size, 5);
    }

    #[test]
    fn rate_limit_can_be_disabled() {
        let cfg: ServerConfig = toml::from_str("rate_limit_enabled = false").unwrap();
        assert!(!cfg.rate_limit_enabled);
    }

    #[test]
    fn server_config_empty_toml_uses_all_defaults() {
        let cfg: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.max_body_bytes, 10_000);
        assert_eq!(cfg.max_concurrent_requests, 256);
    }
}
