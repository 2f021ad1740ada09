use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use ta_domain::config::{AuthConfig, ProviderConfig, ProviderKind};
use ta_domain::stream::StreamEvent;
use ta_domain::tool::{Message, ToolDefinition};
use ta_providers::openai_compat::OpenAiCompatProvider;
use ta_providers::{ChatRequest, LlmProvider};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider_for(server: &MockServer) -> OpenAiCompatProvider {
    let cfg = ProviderConfig {
        id: "groq".into(),
        kind: ProviderKind::OpenaiCompat,
        base_url: format!("{}/openai/v1", server.uri()),
        auth: AuthConfig {
            key: Some("gsk-test".into()),
            ..Default::default()
        },
        default_model: Some("llama-test".into()),
    };
    OpenAiCompatProvider::from_config(&cfg, 5_000).unwrap()
}

fn weather_tool() -> ToolDefinition {
    ToolDefinition {
        name: "get_weather".into(),
        description: "Current weather for a city".into(),
        parameters: json!({"type": "object", "properties": {"city": {"type": "string"}}}),
    }
}

fn sse(chunks: &[serde_json::Value]) -> String {
    let mut body = String::new();
    for c in chunks {
        body.push_str(&format!("data: {c}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

async fn collect(provider: &OpenAiCompatProvider, req: &ChatRequest) -> Vec<StreamEvent> {
    let mut stream = provider.chat_stream(req).await.unwrap();
    let mut events = Vec::new();
    while let Some(ev) = stream.next().await {
        events.push(ev.unwrap());
    }
    events
}

#[tokio::test]
async fn streams_tokens_and_sends_auth_and_model() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"choices":[{"index":0,"delta":{"role":"assistant","content":"Hello"}}]}),
        json!({"choices":[{"index":0,"delta":{"content":" there"}}]}),
        json!({"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}),
    ]);

    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(header("authorization", "Bearer gsk-test"))
        .and(body_partial_json(json!({"model": "llama-test", "stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(body, "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let req = ChatRequest {
        messages: vec![Message::system("be brief"), Message::user("hi")],
        ..Default::default()
    };
    let events = collect(&provider, &req).await;

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Token { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Hello there");

    let dones = events.iter().filter(|e| matches!(e, StreamEvent::Done { .. })).count();
    assert_eq!(dones, 1);
}

#[tokio::test]
async fn assembles_fragmented_tool_call_arguments() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"get_weather","arguments":""}}]}}]}),
        json!({"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"city\":"}}]}}]}),
        json!({"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"Kyoto\"}"}}]}}]}),
        json!({"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}),
    ]);

    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(body_partial_json(json!({"tools": [{"type": "function", "function": {"name": "get_weather"}}]})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let req = ChatRequest {
        messages: vec![Message::user("weather in Kyoto?")],
        tools: vec![weather_tool()],
        ..Default::default()
    };
    let events = collect(&provider, &req).await;

    let finished: Vec<(String, String, serde_json::Value)> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolCallFinished { call_id, tool_name, arguments } => {
                Some((call_id.clone(), tool_name.clone(), arguments.clone()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        finished,
        vec![("call_1".to_string(), "get_weather".to_string(), json!({"city": "Kyoto"}))]
    );

    assert!(events.iter().all(|e| match e {
        StreamEvent::ToolCallDelta { call_id, .. } => call_id == "call_1",
        _ => true,
    }));
}

#[tokio::test]
async fn rejected_tool_call_surfaces_as_tool_use_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "Failed to call a function. Please adjust your prompt.",
                "type": "invalid_request_error",
                "code": "tool_use_failed"
            }
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let req = ChatRequest {
        messages: vec![Message::user("weather?")],
        tools: vec![weather_tool()],
        ..Default::default()
    };
    let err = match provider.chat_stream(&req).await {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };
    assert!(err.is_tool_use_failure(), "got: {err}");
    assert!(err.to_string().contains("HTTP 400"));
}

#[tokio::test]
async fn in_stream_tool_use_failure_keeps_its_code() {
    let server = MockServer::start().await;
    let body = sse(&[
        json!({"choices":[{"index":0,"delta":{"role":"assistant","content":"Let me check"}}]}),
        json!({"error":{"message":"Failed to call a function.","type":"invalid_request_error","code":"tool_use_failed"}}),
    ]);
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let req = ChatRequest {
        messages: vec![Message::user("weather?")],
        tools: vec![weather_tool()],
        ..Default::default()
    };
    let events = collect(&provider, &req).await;
    let message = events
        .iter()
        .find_map(|e| match e {
            StreamEvent::Error { message } => Some(message.clone()),
            _ => None,
        })
        .expect("an error event");
    let err = ta_domain::error::Error::Provider {
        provider: "groq".into(),
        message,
    };
    assert!(err.is_tool_use_failure(), "got: {err}");
}

#[tokio::test]
async fn non_streaming_chat_returns_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": false, "temperature": 0.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama-test",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "VERDICT: allowed"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 20, "completion_tokens": 3, "total_tokens": 23}
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let req = ChatRequest {
        messages: vec![Message::user("classify")],
        temperature: Some(0.0),
        ..Default::default()
    };
    let resp = provider.chat(&req).await.unwrap();
    assert_eq!(resp.content, "VERDICT: allowed");
    assert_eq!(resp.usage.map(|u| u.total_tokens), Some(23));
    assert!(resp.tool_calls.is_empty());
}

#[tokio::test]
async fn stream_without_done_sentinel_still_finishes() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\n",
        json!({"choices":[{"index":0,"delta":{"content":"partial"}}]})
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let events = collect(&provider, &ChatRequest::default()).await;
    assert!(matches!(events.first(), Some(StreamEvent::Token { text }) if text == "partial"));
    assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));
}
