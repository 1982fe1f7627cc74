//! Integration tests for the skillgate HTTP API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use skillgate_agent::{AgentClient, AgentStream, QueryOptions};
use skillgate_config::Settings;
use skillgate_core::{AgentError, UpstreamMessage};
use skillgate_server::{create_app, ServerState};
use skillgate_tools::ToolRegistry;
use tower::ServiceExt; // for `oneshot`

/// Upstream double that replays the same messages on every query.
struct FakeAgent {
    lines: Vec<Value>,
    fail_after: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl FakeAgent {
    fn new(lines: Vec<Value>) -> Self {
        Self {
            lines,
            fail_after: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing_after(mut self, message: &str) -> Self {
        self.fail_after = Some(message.to_string());
        self
    }
}

#[async_trait]
impl AgentClient for FakeAgent {
    async fn query(&self, _prompt: &str, _options: &QueryOptions) -> Result<AgentStream, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut items: Vec<Result<UpstreamMessage, AgentError>> = self
            .lines
            .iter()
            .map(|v| UpstreamMessage::from_value(v.clone()))
            .collect();
        if let Some(message) = &self.fail_after {
            items.push(Err(AgentError::Request(message.clone())));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

fn init_line() -> Value {
    json!({ "type": "system", "subtype": "init", "session_id": "s1" })
}

fn success_line() -> Value {
    json!({
        "type": "result",
        "subtype": "success",
        "result": "Hello! How can I help?",
        "usage": { "input_tokens": 12, "output_tokens": 7 },
        "total_cost_usd": 0.0015
    })
}

fn test_settings() -> Settings {
    Settings {
        api_key: Some("sk-ant-api03-test-key-0000".into()),
        ..Default::default()
    }
}

/// Helper to create a test app around an upstream double.
fn create_test_app(settings: Settings, agent: FakeAgent) -> (Router, Arc<AtomicUsize>) {
    let calls = agent.calls.clone();
    let state = ServerState::new(
        settings,
        Arc::new(ToolRegistry::with_defaults()),
        Arc::new(agent),
    );
    (create_app(Arc::new(state)), calls)
}

fn default_app() -> (Router, Arc<AtomicUsize>) {
    create_test_app(test_settings(), FakeAgent::new(vec![init_line(), success_line()]))
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Parses an SSE body into (event name, data) pairs.
fn parse_sse(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = Some(serde_json::from_str(v.trim()).unwrap());
                }
            }
            Some((name?, data?))
        })
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = default_app();

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
    assert_eq!(body["config"]["apiKeySet"], true);
    assert_eq!(body["config"]["apiKeyFormat"], "valid");
    assert_eq!(body["config"]["backend"], "api");
    assert!(!body.to_string().contains("test-key"));
}

#[tokio::test]
async fn test_health_without_key_or_diagnostics() {
    let settings = Settings { api_key: None, ..Default::default() };
    let (app, _) = create_test_app(settings, FakeAgent::new(vec![]));
    let body = body_json(app.oneshot(get("/health")).await.unwrap()).await;
    assert_eq!(body["config"]["apiKeySet"], false);
    assert_eq!(body["config"]["apiKeyFormat"], "missing");

    let settings = Settings { health_diagnostics: false, ..test_settings() };
    let (app, _) = create_test_app(settings, FakeAgent::new(vec![]));
    let body = body_json(app.oneshot(get("/health")).await.unwrap()).await;
    assert!(body.get("config").is_none());
}

#[tokio::test]
async fn test_agent_requires_message() {
    for body in ["{}", r#"{"message":""}"#, r#"{"message":null}"#, r#"{"message":5}"#] {
        let (app, calls) = default_app();

        let response = app.oneshot(post("/agent", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(body_json(response).await, json!({ "error": "message field is required" }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_agent_rejects_malformed_json() {
    let (app, calls) = default_app();

    let response = app.oneshot(post("/agent", "{\"message\": ")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body: "));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_agent_streams_progress_then_complete() {
    let (app, calls) = default_app();

    let response = app.oneshot(post("/agent", r#"{"message":"Hello"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    let body = String::from_utf8(body_bytes(response).await).unwrap();
    let events = parse_sse(&body);

    let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["progress", "progress", "complete"]);
    assert_eq!(events[0].1, json!({ "type": "progress", "data": init_line() }));
    assert_eq!(events[1].1["data"]["type"], "result");
    assert_eq!(
        events[2].1,
        json!({
            "type": "complete",
            "response": "Hello! How can I help?",
            "usage": { "input_tokens": 12, "output_tokens": 7 },
            "cost_usd": 0.0015
        })
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_agent_stream_error_event_on_upstream_failure() {
    let agent = FakeAgent::new(vec![init_line()]).failing_after("connection reset");
    let (app, _) = create_test_app(test_settings(), agent);

    let response = app.oneshot(post("/agent", r#"{"message":"Hello"}"#)).await.unwrap();
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    let events = parse_sse(&body);

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].0, "progress");
    assert_eq!(events[1].0, "error");
    assert_eq!(
        events[1].1,
        json!({ "type": "error", "errors": ["Agent request failed: connection reset"] })
    );
}

#[tokio::test]
async fn test_agent_stream_without_result_reports_unknown_error() {
    let (app, _) = create_test_app(test_settings(), FakeAgent::new(vec![init_line()]));

    let response = app.oneshot(post("/agent", r#"{"message":"Hello"}"#)).await.unwrap();
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    let events = parse_sse(&body);

    assert_eq!(events.last().unwrap().1["errors"], json!(["Unknown error occurred"]));
}

#[tokio::test]
async fn test_agent_json_success() {
    let (app, _) = default_app();

    let response = app
        .oneshot(post("/agent", r#"{"message":"Hello","stream":false}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "success": true,
            "response": "Hello! How can I help?",
            "usage": { "input_tokens": 12, "output_tokens": 7 },
            "cost_usd": 0.0015
        })
    );
}

#[tokio::test]
async fn test_agent_json_selected_by_query_and_accept() {
    let (app, _) = default_app();
    let response = app
        .oneshot(post("/agent?stream=false", r#"{"message":"Hello"}"#))
        .await
        .unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

    let (app, _) = default_app();
    let request = Request::builder()
        .uri("/agent")
        .method("POST")
        .header("content-type", "application/json")
        .header("accept", "application/json")
        .body(Body::from(r#"{"message":"Hello"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(body_json(response).await["success"], true);
}

#[tokio::test]
async fn test_agent_json_failure_outcome() {
    let failure = json!({
        "type": "result",
        "subtype": "error_max_turns",
        "errors": ["Reached maximum number of turns (10)"]
    });
    let (app, _) = create_test_app(test_settings(), FakeAgent::new(vec![init_line(), failure]));

    let response = app
        .oneshot(post("/agent", r#"{"message":"Hello","stream":false}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "success": false, "error": ["Reached maximum number of turns (10)"] })
    );
}

#[tokio::test]
async fn test_agent_json_null_errors_is_unknown_failure() {
    let failure = json!({ "type": "result", "subtype": "error_during_execution", "errors": null });
    let (app, _) = create_test_app(test_settings(), FakeAgent::new(vec![init_line(), failure]));

    let response = app
        .oneshot(post("/agent", r#"{"message":"Hello","stream":false}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "success": false, "error": ["Unknown error occurred"] })
    );
}

#[tokio::test]
async fn test_agent_json_upstream_error() {
    let agent = FakeAgent::new(vec![]).failing_after("connection refused");
    let (app, _) = create_test_app(test_settings(), agent);

    let response = app
        .oneshot(post("/agent", r#"{"message":"Hello","stream":false}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Agent request failed: connection refused" })
    );
}

#[tokio::test]
async fn test_list_skills() {
    let (app, _) = default_app();

    let response = app.oneshot(get("/skills")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let names: Vec<&str> = body["skills"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["calculator", "greeting"]);
    assert!(body["skills"][0]["description"].is_string());
}

#[tokio::test]
async fn test_invoke_calculator_skill() {
    let (app, _) = default_app();
    let response = app
        .oneshot(post("/skills/calculator", r#"{"operation":"multiply","a":6,"b":7}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["result"], 42);

    let (app, _) = default_app();
    let response = app
        .oneshot(post("/skills/calculator", r#"{"operation":"divide","a":1,"b":0}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "error": "Cannot divide by zero" }));
}

#[tokio::test]
async fn test_invoke_greeting_with_empty_body() {
    let (app, _) = default_app();

    let response = app.oneshot(post("/skills/greeting", "")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().starts_with("Hello, friend!"));
}

#[tokio::test]
async fn test_invoke_skill_errors() {
    let (app, _) = default_app();
    let response = app.oneshot(post("/skills/dice-roller", "{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({ "error": "Unknown skill: dice-roller" }));

    let (app, _) = default_app();
    let response = app.oneshot(post("/skills/greeting", r#"{"name":7}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (app, _) = default_app();
    let response = app.oneshot(post("/skills/calculator", "not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_lists_endpoints() {
    let (app, _) = default_app();

    let response = app.oneshot(get("/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({
            "error": "Not found",
            "availableEndpoints": [
                "GET /health",
                "GET /skills",
                "POST /skills/{name}",
                "POST /agent",
                "GET /"
            ]
        })
    );
}

#[tokio::test]
async fn test_wrong_method_is_not_found() {
    let (app, calls) = default_app();

    let response = app.oneshot(get("/agent")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Not found");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, calls) = default_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/agent")
                .method("OPTIONS")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, OPTIONS");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cors_headers_on_responses_and_disabled() {
    let (app, _) = default_app();
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let settings = Settings { cors_enabled: false, ..test_settings() };
    let (app, _) = create_test_app(settings, FakeAgent::new(vec![]));
    let response = app.oneshot(get("/health")).await.unwrap();
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_index_page_served_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let page = dir.path().join("index.html");
    std::fs::write(&page, "<h1>v1</h1>").unwrap();
    let settings = Settings { static_index: page.clone(), ..test_settings() };
    let (app, _) = create_test_app(settings, FakeAgent::new(vec![]));

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(body_bytes(response).await, b"<h1>v1</h1>");

    std::fs::write(&page, "<h1>v2</h1>").unwrap();
    let response = app.oneshot(get("/index.html")).await.unwrap();
    assert_eq!(body_bytes(response).await, b"<h1>v2</h1>");
}

#[tokio::test]
async fn test_index_page_returns_non_utf8_bytes_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let page = dir.path().join("index.html");
    std::fs::write(&page, b"<p>caf\xe9</p>").unwrap();
    let settings = Settings { static_index: page, ..test_settings() };
    let (app, _) = create_test_app(settings, FakeAgent::new(vec![]));

    let response = app.oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"<p>caf\xe9</p>");
}

#[tokio::test]
async fn test_index_page_missing_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        static_index: dir.path().join("missing.html"),
        ..test_settings()
    };
    let (app, _) = create_test_app(settings, FakeAgent::new(vec![]));

    let response = app.oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(response).await["error"].is_string());
}
