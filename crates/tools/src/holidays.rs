//! `get_public_holidays`: Nager.Date public holiday calendar.

use chrono::Datelike;
use serde::Deserialize;
use serde_json::{json, Value};
use ta_domain::tool::ToolDefinition;

use crate::error::{parse_args, ToolError};
use crate::http::{endpoint, lenient_number, Fetched, Lookup};

pub const NAME: &str = "get_public_holidays";

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: NAME.into(),
        description: "Public holidays of a country for a year. Use it when timing a trip \
                      around local celebrations or closures."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "country_code": {
                    "type": "string",
                    "description": "ISO 3166-1 alpha-2 code, e.g. 'JP', 'FR', 'US'"
                },
                "year": {
                    "type": "integer",
                    "description": "Calendar year (defaults to the current year)"
                }
            },
            "required": ["country_code"]
        }),
    }
}

#[derive(Debug, Deserialize)]
struct Args {
    country_code: String,
    #[serde(default, deserialize_with = "lenient_number")]
    year: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Holiday {
    date: String,
    #[serde(default)]
    local_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

pub(crate) async fn call(lookup: &Lookup, args: &Value) -> Result<String, ToolError> {
    let args: Args = parse_args(args)?;
    let code = args.country_code.trim().to_ascii_uppercase();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ToolError::InvalidArguments(format!(
            "country_code must be a 2-letter ISO code, got '{}'",
            args.country_code
        )));
    }
    let year = match args.year {
        Some(y) if y.fract() == 0.0 && (1900.0..=2100.0).contains(&y) => y as i32,
        Some(y) => {
            return Err(ToolError::InvalidArguments(format!("year out of range: {y}")))
        }
        None => chrono::Utc::now().year(),
    };

    let year_segment = year.to_string();
    let url = endpoint(
        "holidays",
        &lookup.endpoints.holidays_url,
        &["api", "v3", "PublicHolidays", &year_segment, &code],
    )?;

    let holidays: Vec<Holiday> = match lookup.get_json("holidays", url, &[]).await? {
        Fetched::Found(h) => h,
        Fetched::NotFound => {
            return Ok(format!(
                "Could not find holidays for country code '{code}'. A 2-letter ISO code \
                 (e.g. 'JP', 'FR', 'US') is required."
            ))
        }
    };

    if holidays.is_empty() {
        return Ok(format!("No public holidays found for '{code}' in {year}."));
    }

    let mut lines = vec![format!("Public holidays in {code} for {year}:")];
    for h in &holidays {
        lines.push(render_holiday(h));
    }
    Ok(lines.join("\n"))
}

fn render_holiday(h: &Holiday) -> String {
    let local = h.local_name.as_deref().or(h.name.as_deref()).unwrap_or("Unknown");
    match h.name.as_deref() {
        Some(intl) if intl != local => format!("- {}: {local} ({intl})", h.date),
        _ => format!("- {}: {local}", h.date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_and_international_names() {
        let h: Holiday = serde_json::from_value(json!({
            "date": "2026-05-01", "localName": "Fête du Travail", "name": "Labour Day"
        }))
        .unwrap();
        assert_eq!(render_holiday(&h), "- 2026-05-01: Fête du Travail (Labour Day)");

        let h: Holiday = serde_json::from_value(json!({
            "date": "2026-07-04", "localName": "Independence Day", "name": "Independence Day"
        }))
        .unwrap();
        assert_eq!(render_holiday(&h), "- 2026-07-04: Independence Day");
    }
}
