//! Wire types for the Gemini `generateContent` endpoint.

use serde::{Deserialize, Serialize};

/// Request body for `models/{model}:generateContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

/// A content block in a generate request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

/// A text part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// Generation settings; JSON output is requested on every call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
}

impl GenerateRequest {
    /// Build a single-turn user request with JSON output enabled.
    pub fn user_prompt(prompt: impl Into<String>) -> Self {
        Self {
            contents: vec![Content {
                role: "user".into(),
                parts: vec![Part {
                    text: prompt.into(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".into(),
            },
        }
    }
}

/// Raw response body from `generateContent`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponseRaw {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

/// A single generation candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

/// Token accounting for a generate call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
}

/// A completed generation with its token usage.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Concatenated candidate text.
    pub text: String,
    /// Prompt tokens consumed.
    pub tokens_in: u64,
    /// Output tokens produced.
    pub tokens_out: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_camel_case() {
        let request = GenerateRequest::user_prompt("Analyze this site.");
        let json = serde_json::to_string(&request).expect("serialize");
        assert!(json.contains(r#""generationConfig""#));
        assert!(json.contains(r#""responseMimeType":"application/json""#));
        assert!(json.contains(r#""role":"user""#));
        assert!(json.contains("Analyze this site."));
    }

    #[test]
    fn response_deserializes() {
        let json = r#"{
            "candidates": [{"content": {"role": "model", "parts": [{"text": "{\"ok\":true}"}]}}],
            "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 30}
        }"#;
        let raw: GenerateResponseRaw = serde_json::from_str(json).expect("deserialize");
        assert_eq!(raw.candidates.len(), 1);
        let usage = raw.usage_metadata.expect("usage");
        assert_eq!(usage.prompt_token_count, 120);
        assert_eq!(usage.candidates_token_count, 30);
    }

    #[test]
    fn empty_response_deserializes() {
        let raw: GenerateResponseRaw = serde_json::from_str("{}").expect("deserialize");
        assert!(raw.candidates.is_empty());
        assert!(raw.usage_metadata.is_none());
    }
}
