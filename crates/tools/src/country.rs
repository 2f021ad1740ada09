//! `get_country_info`: REST Countries v3.1 lookup.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};
use ta_domain::tool::ToolDefinition;

use crate::error::{parse_args, ToolError};
use crate::http::{endpoint, Fetched, Lookup};

pub const NAME: &str = "get_country_info";

const FIELDS: &str = "name,capital,currencies,languages,population,region,subregion,timezones";

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: NAME.into(),
        description: "Travel facts about a country: capital, region, currency, languages, \
                      population and timezones."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "country_name": {
                    "type": "string",
                    "description": "Country name in English, e.g. 'Japan' or 'Brazil'"
                }
            },
            "required": ["country_name"]
        }),
    }
}

#[derive(Debug, Deserialize)]
struct Args {
    country_name: String,
}

#[derive(Debug, Deserialize)]
struct Country {
    name: CountryName,
    #[serde(default)]
    capital: Vec<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    subregion: Option<String>,
    #[serde(default)]
    currencies: BTreeMap<String, Currency>,
    #[serde(default)]
    languages: BTreeMap<String, String>,
    #[serde(default)]
    population: u64,
    #[serde(default)]
    timezones: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CountryName {
    common: Option<String>,
    official: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Currency {
    name: Option<String>,
    symbol: Option<String>,
}

pub(crate) async fn call(lookup: &Lookup, args: &Value) -> Result<String, ToolError> {
    let args: Args = parse_args(args)?;
    let name = args.country_name.trim();
    if name.is_empty() {
        return Err(ToolError::InvalidArguments("country_name must not be empty".into()));
    }

    let url = endpoint("countries", &lookup.endpoints.countries_url, &["v3.1", "name", name])?;
    let countries: Vec<Country> = match lookup
        .get_json("countries", url, &[("fields", FIELDS.into())])
        .await?
    {
        Fetched::Found(c) => c,
        Fetched::NotFound => Vec::new(),
    };

    Ok(match countries.first() {
        Some(country) => render(name, country),
        None => format!("Could not find information for '{name}'. Ask the user to check the country name."),
    })
}

fn render(query: &str, c: &Country) -> String {
    let official = c
        .name
        .official
        .as_deref()
        .or(c.name.common.as_deref())
        .unwrap_or(query);
    let capital = join_or_unknown(c.capital.iter().map(String::as_str));

    let region = c.region.as_deref().unwrap_or("Unknown");
    let region = match c.subregion.as_deref().filter(|s| !s.is_empty()) {
        Some(sub) => format!("{region} ({sub})"),
        None => region.to_string(),
    };

    let currencies = join_or_unknown(c.currencies.iter().map(|(code, cur)| {
        let name = cur.name.as_deref().unwrap_or(code);
        let symbol = cur.symbol.as_deref().unwrap_or("");
        format!("{name} ({code}) {symbol}").trim_end().to_string()
    }));
    let languages = join_or_unknown(c.languages.values().map(String::as_str));
    let timezones = join_or_unknown(c.timezones.iter().map(String::as_str));

    format!(
        "Country: {official}\n\
         - Capital: {capital}\n\
         - Region: {region}\n\
         - Currency: {currencies}\n\
         - Languages: {languages}\n\
         - Population: {}\n\
         - Timezones: {timezones}",
        format_population(c.population)
    )
}

fn join_or_unknown<I, S>(items: I) -> String
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<String> = items.map(|s| s.as_ref().to_string()).collect();
    if parts.is_empty() {
        "Unknown".into()
    } else {
        parts.join(", ")
    }
}

/// `125_700_000` -> "125.7 million", `38_000` -> "38.0 thousand".
pub fn format_population(pop: u64) -> String {
    if pop >= 1_000_000 {
        format!("{:.1} million", pop as f64 / 1_000_000.0)
    } else if pop >= 1_000 {
        format!("{:.1} thousand", pop as f64 / 1_000.0)
    } else {
        pop.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_scales() {
        assert_eq!(format_population(125_700_000), "125.7 million");
        assert_eq!(format_population(38_100), "38.1 thousand");
        assert_eq!(format_population(800), "800");
    }

    #[test]
    fn render_uses_official_name_and_subregion() {
        let c: Country = serde_json::from_value(json!({
            "name": {"common": "Japan", "official": "Japan"},
            "capital": ["Tokyo"],
            "region": "Asia",
            "subregion": "Eastern Asia",
            "currencies": {"JPY": {"name": "Japanese yen", "symbol": "¥"}},
            "languages": {"jpn": "Japanese"},
            "population": 125836021,
            "timezones": ["UTC+09:00"]
        }))
        .unwrap();
        let text = render("japan", &c);
        assert_eq!(
            text,
            "Country: Japan\n- Capital: Tokyo\n- Region: Asia (Eastern Asia)\n\
             - Currency: Japanese yen (JPY) ¥\n- Languages: Japanese\n\
             - Population: 125.8 million\n- Timezones: UTC+09:00"
        );
    }

    #[test]
    fn render_tolerates_missing_fields() {
        let c: Country = serde_json::from_value(json!({"name": {"common": "Atlantis"}})).unwrap();
        let text = render("atlantis", &c);
        assert!(text.starts_with("Country: Atlantis\n- Capital: Unknown"));
        assert!(text.contains("- Region: Unknown\n"));
    }
}
