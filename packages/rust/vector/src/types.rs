//! Wire types for the vector-search REST API.

use serde::{Deserialize, Serialize};

/// Settings for creating a new inference index.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    /// Serverless cloud provider.
    pub cloud: String,
    /// Serverless region.
    pub region: String,
    /// Hosted embedding model.
    pub embed_model: String,
}

/// Body for `POST /indexes/create-for-model`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateIndexRequest {
    pub name: String,
    pub cloud: String,
    pub region: String,
    pub embed: EmbedConfig,
}

/// Embedding config binding the index to a hosted model.
#[derive(Debug, Clone, Serialize)]
pub struct EmbedConfig {
    pub model: String,
    pub field_map: FieldMap,
}

/// Maps the record field holding embeddable text.
#[derive(Debug, Clone, Serialize)]
pub struct FieldMap {
    pub text: String,
}

impl CreateIndexRequest {
    pub fn new(name: &str, spec: &IndexSpec) -> Self {
        Self {
            name: name.to_string(),
            cloud: spec.cloud.clone(),
            region: spec.region.clone(),
            embed: EmbedConfig {
                model: spec.embed_model.clone(),
                field_map: FieldMap {
                    text: "chunk_text".into(),
                },
            },
        }
    }
}

/// One upserted text record; embedding happens server-side from `chunk_text`.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub chunk_text: String,
    pub url: String,
}

/// A retrieved context passage.
#[derive(Debug, Clone)]
pub struct ContextHit {
    /// Source page URL.
    pub url: String,
    /// The retrieved chunk text.
    pub text: String,
    /// Similarity score.
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Raw response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct IndexDescriptionRaw {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub status: Option<IndexStatusRaw>,
    #[serde(default)]
    pub embed: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IndexStatusRaw {
    #[serde(default)]
    pub ready: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponseRaw {
    pub result: SearchResultRaw,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResultRaw {
    #[serde(default)]
    pub hits: Vec<SearchHitRaw>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchHitRaw {
    #[serde(rename = "_score", default)]
    pub score: f64,
    #[serde(default)]
    pub fields: SearchFieldsRaw,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchFieldsRaw {
    #[serde(default)]
    pub chunk_text: String,
    #[serde(default = "unknown_url")]
    pub url: String,
}

impl Default for SearchFieldsRaw {
    fn default() -> Self {
        Self {
            chunk_text: String::new(),
            url: unknown_url(),
        }
    }
}

fn unknown_url() -> String {
    "unknown".into()
}
