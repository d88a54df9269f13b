//! REST API integration tests, driven through the router with mocked
//! upstream services.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;
use uuid::Uuid;

use siteagent_core::Services;
use siteagent_llm::GeminiClient;
use siteagent_server::build_app;
use siteagent_shared::{CrawlConfig, RetrievalConfig};
use siteagent_storage::Storage;
use siteagent_vector::IndexSpec;

const TEST_TOKEN: &str = "test-token";

async fn test_app(gemini_base: &str) -> Router {
    let tmp = std::env::temp_dir().join(format!("sa-api-{}.db", Uuid::now_v7()));
    let services = Services {
        storage: Storage::open(&tmp).await.expect("open test db"),
        llm: GeminiClient::new("test-key").with_base_url(gemini_base),
        vector: None,
        model_id: "gemini-2.5-flash".into(),
        index_spec: IndexSpec {
            cloud: "aws".into(),
            region: "us-east-1".into(),
            embed_model: "llama-text-embed-v2".into(),
        },
        crawl: CrawlConfig {
            depth: 1,
            max_pages: 5,
            concurrency: 2,
            rate_limit_ms: 0,
            exclude_patterns: vec![],
        },
        retrieval: RetrievalConfig::default(),
        allow_local_crawl: true,
    };
    build_app(Arc::new(services), TEST_TOKEN.into())
}

async fn mount_gemini(server: &wiremock::MockServer, text: &str) {
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path(
            "/models/gemini-2.5-flash:generateContent",
        ))
        .respond_with(
            wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}],
                "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}
            })),
        )
        .mount(server)
        .await;
}

fn post_json(uri: &str, body: serde_json::Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        // Rate limiting keys on the forwarded client IP
        .header("x-forwarded-for", "203.0.113.7");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn root_serves_banner() {
    let gemini = wiremock::MockServer::start().await;
    let app = test_app(&gemini.uri()).await;

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["service"], "siteagent");
}

#[tokio::test]
async fn health_needs_no_auth() {
    let gemini = wiremock::MockServer::start().await;
    let app = test_app(&gemini.uri()).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn analyze_rejects_missing_token() {
    let gemini = wiremock::MockServer::start().await;
    let app = test_app(&gemini.uri()).await;

    let response = app
        .oneshot(post_json(
            "/analyze",
            serde_json::json!({"url": "https://example.com"}),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Unauthorized");
}

#[tokio::test]
async fn chat_rejects_wrong_token() {
    let gemini = wiremock::MockServer::start().await;
    let app = test_app(&gemini.uri()).await;

    let response = app
        .oneshot(post_json(
            "/chat",
            serde_json::json!({"url": "https://example.com", "query": "hello"}),
            Some("not-the-token"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn analyze_rejects_invalid_url() {
    let gemini = wiremock::MockServer::start().await;
    let app = test_app(&gemini.uri()).await;

    let response = app
        .oneshot(post_json(
            "/analyze",
            serde_json::json!({"url": "not a url"}),
            Some(TEST_TOKEN),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("invalid URL"));
}

#[tokio::test]
async fn analyze_returns_structured_report() {
    let site = wiremock::MockServer::start().await;
    let gemini = wiremock::MockServer::start().await;

    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Acme</title></head><body><p>Acme builds logistics software.</p></body></html>",
        ))
        .mount(&site)
        .await;

    mount_gemini(
        &gemini,
        "{\"company_info\": {\"industry\": \"Logistics software\"}, \"extracted_answers\": []}",
    )
    .await;

    let app = test_app(&gemini.uri()).await;
    let response = app
        .oneshot(post_json(
            "/analyze",
            serde_json::json!({"url": site.uri()}),
            Some(TEST_TOKEN),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["company_info"]["industry"], "Logistics software");
    // Unreported fields surface their placeholder defaults
    assert_eq!(json["company_info"]["location"], "Information not found");
    assert!(json["analysis_timestamp"].is_string());
}

#[tokio::test]
async fn chat_returns_grounded_answer() {
    let site = wiremock::MockServer::start().await;
    let gemini = wiremock::MockServer::start().await;

    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(
            "<html><body><p>Acme sells widgets to factories.</p></body></html>",
        ))
        .mount(&site)
        .await;

    mount_gemini(
        &gemini,
        "{\"agent_response\": \"They sell widgets.\", \"context_sources\": [\"Acme sells widgets to factories.\"]}",
    )
    .await;

    let app = test_app(&gemini.uri()).await;
    let response = app
        .oneshot(post_json(
            "/chat",
            serde_json::json!({
                "url": site.uri(),
                "query": "What do they sell?",
                "thread_id": "t-42",
                "conversation_history": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"}
                ]
            }),
            Some(TEST_TOKEN),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["user_query"], "What do they sell?");
    assert_eq!(json["agent_response"], "They sell widgets.");
    assert_eq!(json["context_sources"][0], "Acme sells widgets to factories.");
}

#[tokio::test]
async fn analyze_is_rate_limited_per_ip() {
    let gemini = wiremock::MockServer::start().await;
    let app = test_app(&gemini.uri()).await;

    // Burst of 5 allowed; the 6th hits the limiter. Invalid URLs keep the
    // requests cheap while still passing through the governor.
    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(post_json(
                "/analyze",
                serde_json::json!({"url": "not a url"}),
                Some(TEST_TOKEN),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .oneshot(post_json(
            "/analyze",
            serde_json::json!({"url": "not a url"}),
            Some(TEST_TOKEN),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
