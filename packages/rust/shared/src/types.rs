//! Core domain types for siteagent analyses and chat threads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder used when the model could not find a field in the site content.
pub const INFO_NOT_FOUND: &str = "Information not found";

// ---------------------------------------------------------------------------
// SiteId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for analyzed-site identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub Uuid);

impl SiteId {
    /// Generate a new time-sortable site identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SiteId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SiteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// PageMeta
// ---------------------------------------------------------------------------

/// Metadata for a single fetched page, stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    /// Unique page identifier (UUID v7).
    pub id: String,
    /// Owning site.
    pub site_id: String,
    /// Original page URL.
    pub url: String,
    /// Page title (from `<title>` or first `<h1>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// SHA-256 hash of the raw HTML.
    pub content_hash: String,
    /// When the page was last fetched.
    pub fetched_at: chrono::DateTime<chrono::Utc>,
    /// HTTP status code from fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Content length in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_len: Option<usize>,
}

// ---------------------------------------------------------------------------
// Chat types
// ---------------------------------------------------------------------------

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    /// Storage/prompt representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown chat role: {other}")),
        }
    }
}

/// A single conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The model's structured reply to a grounded chat prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    /// The assistant's answer.
    pub agent_response: String,
    /// Direct quotes or short summaries of the passages used to answer.
    #[serde(default)]
    pub context_sources: Vec<String>,
}

// ---------------------------------------------------------------------------
// Analysis report types
// ---------------------------------------------------------------------------

fn default_not_found() -> Option<String> {
    Some(INFO_NOT_FOUND.to_string())
}

/// Contact details the model extracted from the site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Platform name → profile URL.
    #[serde(default)]
    pub social_media: std::collections::BTreeMap<String, Option<String>>,
}

/// Structured business insights for an analyzed site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyInfo {
    #[serde(default = "default_not_found")]
    pub industry: Option<String>,
    #[serde(default = "default_not_found")]
    pub company_size: Option<String>,
    #[serde(default = "default_not_found")]
    pub location: Option<String>,
    #[serde(default)]
    pub core_products_services: Vec<String>,
    #[serde(default = "default_not_found")]
    pub unique_selling_proposition: Option<String>,
    #[serde(default = "default_not_found")]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub contact_info: ContactInfo,
    #[serde(default)]
    pub overall_sentiment: Option<String>,
}

impl Default for CompanyInfo {
    fn default() -> Self {
        Self {
            industry: default_not_found(),
            company_size: default_not_found(),
            location: default_not_found(),
            core_products_services: Vec::new(),
            unique_selling_proposition: default_not_found(),
            target_audience: default_not_found(),
            contact_info: ContactInfo::default(),
            overall_sentiment: None,
        }
    }
}

/// An answer to a caller-supplied question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedAnswer {
    pub question: String,
    pub answer: String,
}

/// The full analysis payload returned by the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default)]
    pub company_info: CompanyInfo,
    #[serde(default)]
    pub extracted_answers: Vec<ExtractedAnswer>,
}
