//! Router assembly: routes plus the tower middleware stack.

use std::sync::Arc;

use anyhow::Context;
use axum::body::Body;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware;
use axum::response::Response;
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use ta_domain::config::{CorsConfig, ServerConfig};

use crate::api;
use crate::state::AppState;

/// Build the complete HTTP application.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`:
/// the per-IP rate limiter keys on the peer address.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let config = state.config.clone();
    let server = &config.server;

    let chat = with_rate_limit(api::chat_routes(server.max_body_bytes), server)?;

    tracing::info!(
        max_concurrent = server.max_concurrent_requests,
        max_body_bytes = server.max_body_bytes,
        "request limits set"
    );

    Ok(api::public_routes()
        .merge(chat)
        .layer(build_cors_layer(&server.cors))
        .layer(ConcurrencyLimitLayer::new(server.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rate limiting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Wrap the chat routes in the per-IP token bucket, when enabled.
fn with_rate_limit(chat: Router<AppState>, server: &ServerConfig) -> anyhow::Result<Router<AppState>> {
    if !server.rate_limit_enabled {
        tracing::info!("per-IP rate limiting disabled");
        return Ok(chat);
    }
    let rl = &server.rate_limit;
    let gov_config = GovernorConfigBuilder::default()
        .per_millisecond(rl.replenish_every_ms)
        .burst_size(rl.burst_size)
        .finish()
        .context("rate_limit: replenish_every_ms and burst_size must be > 0")?;

    tracing::info!(
        replenish_every_ms = rl.replenish_every_ms,
        burst_size = rl.burst_size,
        "per-IP rate limiting enabled on chat routes"
    );

    Ok(chat
        .layer(GovernorLayer {
            config: Arc::new(gov_config),
        })
        .layer(middleware::map_response(rate_limited_as_json)))
}

/// The limiter answers 429 in plain text; keep its headers but give the
/// body the same `{ "error": ... }` shape as every other API error.
async fn rate_limited_as_json(response: Response) -> Response {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    let body = serde_json::json!({ "error": "rate limit exceeded, please slow down" });
    Response::from_parts(parts, Body::from(body.to_string()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CORS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Origins may end in a `:*` wildcard for the port segment
/// (e.g. `http://localhost:*`), which matches any numeric port on that
/// host. A literal `"*"` allows all origins.
pub fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\", all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &cors.allowed_origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            let origin_str = origin.to_str().unwrap_or("");
            wildcard_prefixes
                .iter()
                .any(|prefix| origin_matches_prefix(origin_str, prefix))
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// `prefix` ends with `:`; the rest of the origin must be a port number.
fn origin_matches_prefix(origin: &str, prefix: &str) -> bool {
    origin
        .strip_prefix(prefix)
        .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
