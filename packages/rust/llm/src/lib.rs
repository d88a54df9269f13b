//! Gemini REST API client.
//!
//! A minimal client for the `generateContent` endpoint with no
//! domain-specific logic. Every call requests a JSON response MIME type, so
//! callers can parse model output as structured data.
//!
//! # Example
//!
//! ```rust,ignore
//! use siteagent_llm::GeminiClient;
//!
//! let client = GeminiClient::new(api_key);
//! let completion = client.generate("gemini-2.5-flash", "Summarize: ...").await?;
//! println!("{}", completion.text);
//! ```

pub mod types;

pub use types::{Completion, GenerateRequest};

use reqwest::Client;
use tracing::{debug, warn};

use siteagent_shared::{Result, SiteAgentError};

/// Default API endpoint.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini completion API client.
#[derive(Clone)]
pub struct GeminiClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Set a custom base URL (for proxies and tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate a completion for a single-turn prompt.
    ///
    /// The response MIME type is always `application/json`; the returned text
    /// is the model's (ideally JSON) payload.
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<Completion> {
        let start = std::time::Instant::now();
        let request = GenerateRequest::user_prompt(prompt);

        let response = self
            .http_client
            .post(format!(
                "{}/models/{model}:generateContent",
                self.base_url
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Gemini request failed");
                SiteAgentError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Gemini API error");
            return Err(SiteAgentError::Completion(format!(
                "Gemini API error ({status}): {error_text}"
            )));
        }

        let raw: types::GenerateResponseRaw = response
            .json()
            .await
            .map_err(|e| SiteAgentError::parse(format!("invalid Gemini response: {e}")))?;

        let text: String = raw
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(SiteAgentError::Completion(
                "Gemini returned no candidates".into(),
            ));
        }

        let usage = raw.usage_metadata.unwrap_or_default();

        debug!(
            model,
            tokens_in = usage.prompt_token_count,
            tokens_out = usage.candidates_token_count,
            duration_ms = start.elapsed().as_millis(),
            "Gemini completion"
        );

        Ok(Completion {
            text,
            tokens_in: usage.prompt_token_count,
            tokens_out: usage.candidates_token_count,
        })
    }
}
