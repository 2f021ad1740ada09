//! `get_weather`: Nominatim geocoding followed by an Open-Meteo forecast.

use serde::Deserialize;
use serde_json::{json, Value};
use ta_domain::tool::ToolDefinition;

use crate::error::{parse_args, ToolError};
use crate::http::{endpoint, Fetched, Lookup};

pub const NAME: &str = "get_weather";

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: NAME.into(),
        description: "Current conditions and a 7-day forecast for a city. Use it for \
                      questions about weather, what to pack or wear, and outdoor plans."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "City name, e.g. 'Lisbon' or 'Kyoto'"
                },
                "country_code": {
                    "type": "string",
                    "description": "Optional ISO 3166-1 alpha-2 code to disambiguate, e.g. 'PT'"
                }
            },
            "required": ["city"]
        }),
    }
}

#[derive(Debug, Deserialize)]
struct Args {
    city: String,
    #[serde(default)]
    country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Forecast {
    #[serde(default)]
    current: Current,
    #[serde(default)]
    daily: Daily,
}

#[derive(Debug, Default, Deserialize)]
struct Current {
    temperature_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    relative_humidity_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    weather_code: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct Daily {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<i64>>,
}

pub(crate) async fn call(lookup: &Lookup, args: &Value) -> Result<String, ToolError> {
    let args: Args = parse_args(args)?;
    let city = args.city.trim();
    if city.is_empty() {
        return Err(ToolError::InvalidArguments("city must not be empty".into()));
    }

    let query = match args.country_code.as_deref().map(str::trim) {
        Some(cc) if !cc.is_empty() => format!("{city}, {cc}"),
        _ => city.to_string(),
    };

    let url = endpoint("geocoding", &lookup.endpoints.geocoding_url, &["search"])?;
    let places: Vec<Place> = match lookup
        .get_json(
            "geocoding",
            url,
            &[("q", query), ("format", "json".into()), ("limit", "1".into())],
        )
        .await?
    {
        Fetched::Found(places) => places,
        Fetched::NotFound => Vec::new(),
    };

    let Some(place) = places.into_iter().next() else {
        return Ok(format!(
            "Could not find location '{city}'. Ask the user to check the city name."
        ));
    };

    let lat: f64 = place
        .lat
        .parse()
        .map_err(|_| ToolError::decode("geocoding", format!("bad latitude '{}'", place.lat)))?;
    let lon: f64 = place
        .lon
        .parse()
        .map_err(|_| ToolError::decode("geocoding", format!("bad longitude '{}'", place.lon)))?;
    let label = place
        .display_name
        .as_deref()
        .and_then(|d| d.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(city)
        .to_string();

    let url = endpoint("weather", &lookup.endpoints.weather_url, &["v1", "forecast"])?;
    let forecast: Forecast = match lookup
        .get_json(
            "weather",
            url,
            &[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,apparent_temperature,weather_code,wind_speed_10m"
                        .into(),
                ),
                (
                    "daily",
                    "temperature_2m_max,temperature_2m_min,precipitation_sum,weather_code".into(),
                ),
                ("timezone", "auto".into()),
                ("forecast_days", "7".into()),
            ],
        )
        .await?
    {
        Fetched::Found(f) => f,
        Fetched::NotFound => {
            return Err(ToolError::decode("weather", "no forecast for coordinates"))
        }
    };

    Ok(render(&label, lat, lon, &forecast))
}

fn render(label: &str, lat: f64, lon: f64, f: &Forecast) -> String {
    let c = &f.current;
    let mut lines = vec![
        format!("Weather for {label} (lat {lat:.2}, lon {lon:.2}):"),
        String::new(),
        "Current conditions:".to_string(),
        format!("- {}", wmo_code_to_text(c.weather_code.unwrap_or(-1))),
        format!(
            "- Temperature: {}°C (feels like {}°C)",
            show(c.temperature_2m),
            show(c.apparent_temperature)
        ),
        format!("- Humidity: {}%", show(c.relative_humidity_2m)),
        format!("- Wind: {} km/h", show(c.wind_speed_10m)),
        String::new(),
        "7-day forecast:".to_string(),
    ];

    let d = &f.daily;
    for (i, date) in d.time.iter().take(7).enumerate() {
        let low = d.temperature_2m_min.get(i).copied().flatten();
        let high = d.temperature_2m_max.get(i).copied().flatten();
        let code = d.weather_code.get(i).copied().flatten().unwrap_or(-1);
        let rain = match d.precipitation_sum.get(i).copied().flatten() {
            Some(mm) if mm > 0.0 => format!(", {mm}mm rain"),
            _ => String::new(),
        };
        lines.push(format!(
            "- {date}: {}°C to {}°C, {}{rain}",
            show(low),
            show(high),
            wmo_code_to_text(code)
        ));
    }

    lines.join("\n")
}

fn show(v: Option<f64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "n/a".into())
}

/// Decode a WMO weather interpretation code.
pub fn wmo_code_to_text(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 | 57 => "Freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 | 67 => "Freezing rain",
        71 => "Slight snowfall",
        73 => "Moderate snowfall",
        75 => "Heavy snowfall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown conditions",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wmo_codes_decode() {
        assert_eq!(wmo_code_to_text(0), "Clear sky");
        assert_eq!(wmo_code_to_text(63), "Moderate rain");
        assert_eq!(wmo_code_to_text(99), "Thunderstorm with heavy hail");
        assert_eq!(wmo_code_to_text(-1), "Unknown conditions");
        assert_eq!(wmo_code_to_text(42), "Unknown conditions");
    }

    #[test]
    fn render_skips_dry_days_rain_suffix() {
        let f = Forecast {
            current: Current {
                temperature_2m: Some(21.5),
                apparent_temperature: Some(20.0),
                relative_humidity_2m: Some(60.0),
                wind_speed_10m: Some(12.3),
                weather_code: Some(2),
            },
            daily: Daily {
                time: vec!["2026-03-01".into(), "2026-03-02".into()],
                temperature_2m_max: vec![Some(24.0), Some(22.5)],
                temperature_2m_min: vec![Some(15.0), Some(14.0)],
                precipitation_sum: vec![Some(0.0), Some(3.2)],
                weather_code: vec![Some(1), Some(61)],
            },
        };
        let text = render("Lisbon", 38.7223, -9.1393, &f);
        assert!(text.starts_with("Weather for Lisbon (lat 38.72, lon -9.14):"));
        assert!(text.contains("- Partly cloudy"));
        assert!(text.contains("- 2026-03-01: 15°C to 24°C, Mainly clear\n"));
        assert!(text.ends_with("- 2026-03-02: 14°C to 22.5°C, Slight rain, 3.2mm rain"));
    }

    #[test]
    fn missing_values_render_as_na() {
        let text = render("Nowhere", 0.0, 0.0, &Forecast::default());
        assert!(text.contains("Temperature: n/a°C"));
        assert!(text.ends_with("7-day forecast:"));
    }
}
