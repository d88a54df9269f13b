//! Route handlers and their wire types.

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use siteagent_core::{analyze_site, chat_with_site};
use siteagent_shared::{ChatMessage, CompanyInfo, ExtractedAnswer};

use crate::app::AppState;
use crate::error::ApiError;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// `POST /analyze` request body.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub url: String,
    #[serde(default)]
    pub questions: Option<Vec<String>>,
}

/// `POST /analyze` response body.
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub url: String,
    pub analysis_timestamp: DateTime<Utc>,
    pub company_info: CompanyInfo,
    pub extracted_answers: Vec<ExtractedAnswer>,
}

/// `POST /chat` request body.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub url: String,
    pub query: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub conversation_history: Option<Vec<ChatMessage>>,
}

/// `POST /chat` response body.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub url: String,
    pub user_query: String,
    pub agent_response: String,
    pub context_sources: Vec<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Service banner at `/`.
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": "siteagent",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/analyze", "/chat"],
    }))
}

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Crawl a site and return structured business insights.
pub async fn analyze(
    State(state): State<AppState>,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let url = parse_url(&payload.url)?;
    let questions = payload.questions.unwrap_or_default();

    let outcome = analyze_site(&state.services, &url, &questions).await?;

    Ok(Json(AnalyzeResponse {
        url: outcome.url.to_string(),
        analysis_timestamp: outcome.generated_at,
        company_info: outcome.report.company_info,
        extracted_answers: outcome.report.extracted_answers,
    }))
}

/// Answer a follow-up question grounded in the site's indexed content.
pub async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let url = parse_url(&payload.url)?;

    let outcome = chat_with_site(
        &state.services,
        &url,
        &payload.query,
        payload.thread_id.as_deref(),
        payload.conversation_history,
    )
    .await?;

    Ok(Json(ChatResponse {
        url: outcome.url.to_string(),
        user_query: outcome.query,
        agent_response: outcome.reply,
        context_sources: outcome.sources,
    }))
}

fn parse_url(raw: &str) -> Result<Url, ApiError> {
    Url::parse(raw).map_err(|e| ApiError::bad_request(format!("invalid URL '{raw}': {e}")))
}
