//! `get_exchange_rate`: Frankfurter (ECB reference rates).

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};
use ta_domain::tool::ToolDefinition;

use crate::error::{parse_args, ToolError};
use crate::http::{endpoint, lenient_number, Fetched, Lookup};

pub const NAME: &str = "get_exchange_rate";

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: NAME.into(),
        description: "Convert an amount between two currencies at the latest published \
                      rate. Use it for budgets, prices and exchange-rate questions."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "from_currency": {
                    "type": "string",
                    "description": "ISO 4217 source currency, e.g. 'USD'"
                },
                "to_currency": {
                    "type": "string",
                    "description": "ISO 4217 target currency, e.g. 'JPY'"
                },
                "amount": {
                    "type": "number",
                    "description": "Amount to convert (default 1)"
                }
            },
            "required": ["from_currency", "to_currency"]
        }),
    }
}

#[derive(Debug, Deserialize)]
struct Args {
    from_currency: String,
    to_currency: String,
    #[serde(default, deserialize_with = "lenient_number")]
    amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Rates {
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

fn currency_code(raw: &str, field: &str) -> Result<String, ToolError> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ToolError::InvalidArguments(format!(
            "{field} must be a 3-letter ISO currency code, got '{raw}'"
        )));
    }
    Ok(code)
}

pub(crate) async fn call(lookup: &Lookup, args: &Value) -> Result<String, ToolError> {
    let args: Args = parse_args(args)?;
    let from = currency_code(&args.from_currency, "from_currency")?;
    let to = currency_code(&args.to_currency, "to_currency")?;
    let amount = args.amount.unwrap_or(1.0);
    if !(amount.is_finite() && amount > 0.0) {
        return Err(ToolError::InvalidArguments("amount must be a positive number".into()));
    }

    if from == to {
        return Ok(render(&from, &to, amount, amount, "today"));
    }

    let url = endpoint("exchange", &lookup.endpoints.exchange_url, &["latest"])?;
    let fetched: Fetched<Rates> = lookup
        .get_json(
            "exchange",
            url,
            &[
                ("from", from.clone()),
                ("to", to.clone()),
                ("amount", amount.to_string()),
            ],
        )
        .await?;

    let not_recognized = || {
        format!(
            "Currency code '{from}' or '{to}' was not recognized. Standard 3-letter ISO codes \
             (e.g. USD, EUR, JPY) are required."
        )
    };

    let Fetched::Found(rates) = fetched else {
        return Ok(not_recognized());
    };
    let Some(converted) = rates.rates.get(&to).copied() else {
        return Ok(not_recognized());
    };

    Ok(render(
        &from,
        &to,
        amount,
        converted,
        rates.date.as_deref().unwrap_or("today"),
    ))
}

fn render(from: &str, to: &str, amount: f64, converted: f64, date: &str) -> String {
    format!(
        "Exchange rate ({date}):\n\
         - {amount} {from} = {converted:.2} {to}\n\
         - Rate: 1 {from} = {:.4} {to}",
        converted / amount
    )
}
