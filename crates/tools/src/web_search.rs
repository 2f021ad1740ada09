//! `web_search`: DuckDuckGo Instant Answer API.
//!
//! Returns the abstract, direct answer and a handful of related topics.
//! Not a full web index; good enough for "what is X / where is Y" grounding.

use serde::Deserialize;
use serde_json::{json, Value};
use ta_domain::tool::ToolDefinition;

use crate::error::{parse_args, ToolError};
use crate::http::{endpoint, Fetched, Lookup};

pub const NAME: &str = "web_search";

const MAX_TOPICS: usize = 5;

pub fn definition() -> ToolDefinition {
    ToolDefinition {
        name: NAME.into(),
        description: "Search the web for facts about attractions, events, visas or anything \
                      the other tools do not cover."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"}
            },
            "required": ["query"]
        }),
    }
}

#[derive(Debug, Deserialize)]
struct Args {
    query: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    answer: Value,
    #[serde(default)]
    related_topics: Vec<Topic>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Topic {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "FirstURL")]
    first_url: Option<String>,
    /// Category groups nest their own topics.
    #[serde(default)]
    topics: Vec<Topic>,
}

pub(crate) async fn call(lookup: &Lookup, args: &Value) -> Result<String, ToolError> {
    let args: Args = parse_args(args)?;
    let query = args.query.trim();
    if query.is_empty() {
        return Err(ToolError::InvalidArguments("query must not be empty".into()));
    }

    let url = endpoint("web search", &lookup.endpoints.web_search_url, &[])?;
    let answer: InstantAnswer = match lookup
        .get_json(
            "web search",
            url,
            &[
                ("q", query.to_string()),
                ("format", "json".into()),
                ("no_html", "1".into()),
                ("skip_disambig", "1".into()),
            ],
        )
        .await?
    {
        Fetched::Found(a) => a,
        Fetched::NotFound => InstantAnswer::default(),
    };

    Ok(render(query, &answer))
}

fn render(query: &str, a: &InstantAnswer) -> String {
    let mut lines = vec![format!("Search results for '{query}':")];

    if let Some(direct) = a.answer.as_str().filter(|s| !s.is_empty()) {
        lines.push(format!("- Answer: {direct}"));
    }
    if !a.abstract_text.is_empty() {
        let heading = if a.heading.is_empty() { query } else { a.heading.as_str() };
        let source = if a.abstract_url.is_empty() {
            String::new()
        } else {
            format!(" ({})", a.abstract_url)
        };
        lines.push(format!("- {heading}: {}{source}", a.abstract_text));
    }

    let mut topics = Vec::new();
    flatten_topics(&a.related_topics, &mut topics);
    for topic in topics.into_iter().take(MAX_TOPICS) {
        match topic.first_url.as_deref() {
            Some(link) => lines.push(format!("- {} ({link})", topic.text.as_deref().unwrap_or(""))),
            None => lines.push(format!("- {}", topic.text.as_deref().unwrap_or(""))),
        }
    }

    if lines.len() == 1 {
        return format!("No results found for '{query}'.");
    }
    lines.join("\n")
}

fn flatten_topics<'a>(topics: &'a [Topic], out: &mut Vec<&'a Topic>) {
    for t in topics {
        if t.text.as_deref().is_some_and(|s| !s.is_empty()) {
            out.push(t);
        }
        flatten_topics(&t.topics, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_answer_reports_no_results() {
        assert_eq!(
            render("zzzz", &InstantAnswer::default()),
            "No results found for 'zzzz'."
        );
    }

    #[test]
    fn abstract_and_nested_topics_render() {
        let a: InstantAnswer = serde_json::from_value(json!({
            "Heading": "Sagrada Família",
            "AbstractText": "Basilica in Barcelona designed by Gaudí.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Sagrada_Fam%C3%ADlia",
            "Answer": "",
            "RelatedTopics": [
                {"Text": "Antoni Gaudí - Catalan architect", "FirstURL": "https://duckduckgo.com/Antoni_Gaud%C3%AD"},
                {"Name": "Places", "Topics": [
                    {"Text": "Park Güell", "FirstURL": "https://duckduckgo.com/Park_G%C3%BCell"}
                ]}
            ]
        }))
        .unwrap();
        let text = render("sagrada familia", &a);
        assert!(text.contains("- Sagrada Família: Basilica in Barcelona designed by Gaudí."));
        assert!(text.contains("- Antoni Gaudí - Catalan architect (https://duckduckgo.com/Antoni_Gaud%C3%AD)"));
        assert!(text.ends_with("- Park Güell (https://duckduckgo.com/Park_G%C3%BCell)"));
    }
}
