//! Shared HTTP plumbing for the lookups.

use std::time::Duration;

use reqwest::header::USER_AGENT;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use ta_domain::config::{ToolEndpoints, ToolsConfig};

use crate::error::ToolError;

/// What a lookup service said about the requested entity.
pub(crate) enum Fetched<T> {
    Found(T),
    /// 404, 204 or an empty body: the input was not recognized.
    NotFound,
}

/// One HTTP client plus the service base URLs, shared by every tool.
pub(crate) struct Lookup {
    client: reqwest::Client,
    user_agent: String,
    pub(crate) endpoints: ToolEndpoints,
}

impl Lookup {
    pub(crate) fn new(cfg: &ToolsConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ToolError::transport("http client", e))?;
        Ok(Self {
            client,
            user_agent: cfg.user_agent.clone(),
            endpoints: cfg.endpoints.clone(),
        })
    }

    /// GET `url` with `query` and decode a JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        service: &'static str,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<Fetched<T>, ToolError> {
        tracing::debug!(service, url = %url, "tool lookup");

        let resp = self
            .client
            .get(url)
            .query(query)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| ToolError::transport(service, e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            return Ok(Fetched::NotFound);
        }
        if !status.is_success() {
            return Err(ToolError::Status {
                service,
                status: status.as_u16(),
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ToolError::transport(service, e))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Fetched::NotFound);
        }
        serde_json::from_slice(&bytes)
            .map(Fetched::Found)
            .map_err(|e| ToolError::decode(service, e))
    }
}

/// Append path segments to a base URL, percent-encoding each segment.
pub(crate) fn endpoint(
    service: &'static str,
    base: &str,
    segments: &[&str],
) -> Result<Url, ToolError> {
    let mut url = Url::parse(base).map_err(|e| ToolError::decode(service, format!("bad base URL: {e}")))?;
    if segments.is_empty() {
        return Ok(url);
    }
    url.path_segments_mut()
        .map_err(|_| ToolError::decode(service, "base URL cannot carry a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Accepts `12`, `12.5` or `"12.5"` (models often quote numbers).
pub(crate) fn lenient_number<'de, D>(de: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(f64),
        Str(String),
    }

    match Option::<NumOrStr>::deserialize(de)? {
        None => Ok(None),
        Some(NumOrStr::Num(n)) => Ok(Some(n)),
        Some(NumOrStr::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(NumOrStr::Str(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected a number, got \"{s}\""))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_segments() {
        let url = endpoint("countries", "https://restcountries.com", &["v3.1", "name", "New Zealand"]).unwrap();
        assert_eq!(url.as_str(), "https://restcountries.com/v3.1/name/New%20Zealand");
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let url = endpoint("holidays", "http://127.0.0.1:9000/proxy/", &["api", "v3"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/proxy/api/v3");
    }

    #[derive(Deserialize)]
    struct Amount {
        #[serde(default, deserialize_with = "lenient_number")]
        amount: Option<f64>,
    }

    #[test]
    fn lenient_number_accepts_quoted_values() {
        let a: Amount = serde_json::from_value(serde_json::json!({"amount": "250.5"})).unwrap();
        assert_eq!(a.amount, Some(250.5));
        let a: Amount = serde_json::from_value(serde_json::json!({"amount": 3})).unwrap();
        assert_eq!(a.amount, Some(3.0));
        let a: Amount = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(a.amount, None);
        assert!(serde_json::from_value::<Amount>(serde_json::json!({"amount": "lots"})).is_err());
    }
}
