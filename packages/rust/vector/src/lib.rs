//! Pinecone-style vector-search REST client.
//!
//! Wraps the hosted inference-index API: index lifecycle on the control
//! plane, NDJSON record upserts and text search on the per-index data plane.
//! Embeddings are computed server-side by the hosted embedding model; this
//! crate never embeds anything locally.

pub mod naming;
pub mod types;

pub use naming::{chunk_record_id, index_name_for_url};
pub use types::{ChunkRecord, ContextHit, IndexSpec};

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use siteagent_shared::{Result, SiteAgentError};

/// Control-plane endpoint.
const DEFAULT_CONTROL_BASE: &str = "https://api.pinecone.io";

/// API version header sent on every request.
const API_VERSION: &str = "2025-04";

/// Namespace all site chunks live in.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Seconds between readiness polls, and the attempt cap.
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const POLL_ATTEMPTS: u32 = 60;

/// Vector-search API client.
#[derive(Clone)]
pub struct VectorClient {
    http_client: Client,
    api_key: String,
    control_base: String,
}

impl VectorClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            control_base: DEFAULT_CONTROL_BASE.to_string(),
        }
    }

    /// Set a custom control-plane base URL (for tests).
    pub fn with_control_base(mut self, url: impl Into<String>) -> Self {
        self.control_base = url.into();
        self
    }

    /// Ensure an inference index exists and is ready. Returns its data-plane host.
    ///
    /// An existing index without an embed config (a legacy standard index)
    /// is deleted and recreated as an inference index.
    pub async fn ensure_index(&self, name: &str, spec: &IndexSpec) -> Result<String> {
        if let Some(desc) = self.describe_index(name).await? {
            if desc.has_embed {
                info!(index = name, "index already exists with inference");
                if desc.ready {
                    return Ok(desc.host);
                }
                return self.wait_until_ready(name).await;
            }

            // Standard index: delete and recreate with inference
            warn!(index = name, "index is standard, recreating with inference");
            self.delete_index(name).await?;
            self.wait_until_gone(name).await?;
        }

        info!(index = name, "creating new inference index");
        self.create_index(name, spec).await?;
        self.wait_until_ready(name).await
    }

    /// Describe an index. Returns `None` when it does not exist.
    pub async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>> {
        let response = self
            .http_client
            .get(format!("{}/indexes/{name}", self.control_base))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| SiteAgentError::Network(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SiteAgentError::Vector(format!(
                "describe index failed ({status}): {error_text}"
            )));
        }

        let raw: types::IndexDescriptionRaw = response
            .json()
            .await
            .map_err(|e| SiteAgentError::parse(format!("invalid index description: {e}")))?;

        Ok(Some(IndexDescription {
            host: raw.host.unwrap_or_default(),
            ready: raw.status.map(|s| s.ready).unwrap_or(false),
            has_embed: raw.embed.is_some(),
        }))
    }

    /// Create an inference index bound to a hosted embedding model.
    async fn create_index(&self, name: &str, spec: &IndexSpec) -> Result<()> {
        let body = types::CreateIndexRequest::new(name, spec);

        let response = self
            .http_client
            .post(format!("{}/indexes/create-for-model", self.control_base))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| SiteAgentError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let lowered = error_text.to_lowercase();
            if lowered.contains("quota") || lowered.contains("maximum") {
                return Err(SiteAgentError::Vector(format!(
                    "index quota exceeded, delete unused indexes in the dashboard: {error_text}"
                )));
            }
            return Err(SiteAgentError::Vector(format!(
                "create index failed ({status}): {error_text}"
            )));
        }

        Ok(())
    }

    /// Delete an index.
    async fn delete_index(&self, name: &str) -> Result<()> {
        let response = self
            .http_client
            .delete(format!("{}/indexes/{name}", self.control_base))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| SiteAgentError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SiteAgentError::Vector(format!(
                "delete index failed ({status}): {error_text}"
            )));
        }
        Ok(())
    }

    /// Poll until the index reports ready; returns its host.
    async fn wait_until_ready(&self, name: &str) -> Result<String> {
        for _ in 0..POLL_ATTEMPTS {
            if let Some(desc) = self.describe_index(name).await? {
                if desc.ready {
                    debug!(index = name, host = %desc.host, "index is ready");
                    return Ok(desc.host);
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Err(SiteAgentError::Vector(format!(
            "timed out waiting for index {name} to become ready"
        )))
    }

    /// Poll until the index no longer exists.
    async fn wait_until_gone(&self, name: &str) -> Result<()> {
        for _ in 0..POLL_ATTEMPTS {
            if self.describe_index(name).await?.is_none() {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Err(SiteAgentError::Vector(format!(
            "timed out waiting for index {name} to be deleted"
        )))
    }

    /// Upsert text records into a namespace. Embedding happens server-side.
    pub async fn upsert_records(
        &self,
        host: &str,
        namespace: &str,
        records: &[ChunkRecord],
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        // The records API takes NDJSON, one record per line
        let mut body = String::new();
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| SiteAgentError::parse(format!("record serialization: {e}")))?;
            body.push_str(&line);
            body.push('\n');
        }

        let response = self
            .http_client
            .post(format!(
                "{}/records/namespaces/{namespace}/upsert",
                data_url(host)
            ))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| SiteAgentError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SiteAgentError::Vector(format!(
                "upsert failed ({status}): {error_text}"
            )));
        }

        debug!(namespace, count = records.len(), "upserted records");
        Ok(())
    }

    /// Text search over a namespace. Returns the top hits with their source URLs.
    pub async fn search(
        &self,
        host: &str,
        namespace: &str,
        query: &str,
        top_k: u32,
    ) -> Result<Vec<ContextHit>> {
        let body = serde_json::json!({
            "query": {
                "top_k": top_k,
                "inputs": { "text": query },
            }
        });

        let response = self
            .http_client
            .post(format!(
                "{}/records/namespaces/{namespace}/search",
                data_url(host)
            ))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| SiteAgentError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SiteAgentError::Vector(format!(
                "search failed ({status}): {error_text}"
            )));
        }

        let raw: types::SearchResponseRaw = response
            .json()
            .await
            .map_err(|e| SiteAgentError::parse(format!("invalid search response: {e}")))?;

        Ok(raw
            .result
            .hits
            .into_iter()
            .map(|hit| ContextHit {
                url: hit.fields.url,
                text: hit.fields.chunk_text,
                score: hit.score,
            })
            .collect())
    }
}

/// Description of an existing index.
#[derive(Debug, Clone)]
pub struct IndexDescription {
    pub host: String,
    pub ready: bool,
    pub has_embed: bool,
}

/// Data-plane hosts come back without a scheme; tests may override with one.
fn data_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_spec() -> IndexSpec {
        IndexSpec {
            cloud: "aws".into(),
            region: "us-east-1".into(),
            embed_model: "llama-text-embed-v2".into(),
        }
    }

    #[test]
    fn data_url_adds_scheme() {
        assert_eq!(
            data_url("idx-abc.svc.pinecone.io"),
            "https://idx-abc.svc.pinecone.io"
        );
        assert_eq!(data_url("http://127.0.0.1:9000/"), "http://127.0.0.1:9000");
    }

    #[tokio::test]
    async fn ensure_index_returns_existing_host() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/indexes/idx-test"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "name": "idx-test",
                    "host": "idx-test.svc.pinecone.io",
                    "status": { "ready": true, "state": "Ready" },
                    "embed": { "model": "llama-text-embed-v2" }
                }),
            ))
            .mount(&server)
            .await;

        let client = VectorClient::new("pc-key").with_control_base(server.uri());
        let host = client
            .ensure_index("idx-test", &test_spec())
            .await
            .expect("ensure index");
        assert_eq!(host, "idx-test.svc.pinecone.io");
    }

    #[tokio::test]
    async fn ensure_index_creates_when_missing() {
        let server = wiremock::MockServer::start().await;

        // First describe: 404; after create, describe reports ready
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/indexes/idx-new"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/indexes/create-for-model"))
            .respond_with(wiremock::ResponseTemplate::new(201).set_body_json(
                serde_json::json!({ "name": "idx-new" }),
            ))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/indexes/idx-new"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "name": "idx-new",
                    "host": "idx-new.svc.pinecone.io",
                    "status": { "ready": true },
                    "embed": { "model": "llama-text-embed-v2" }
                }),
            ))
            .mount(&server)
            .await;

        let client = VectorClient::new("pc-key").with_control_base(server.uri());
        let host = client
            .ensure_index("idx-new", &test_spec())
            .await
            .expect("ensure index");
        assert_eq!(host, "idx-new.svc.pinecone.io");
    }

    #[tokio::test]
    async fn quota_errors_are_distinguishable() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/indexes/create-for-model"))
            .respond_with(
                wiremock::ResponseTemplate::new(403)
                    .set_body_string("you have reached the MAXIMUM number of indexes"),
            )
            .mount(&server)
            .await;

        let client = VectorClient::new("pc-key").with_control_base(server.uri());
        let err = client
            .ensure_index("idx-full", &test_spec())
            .await
            .expect_err("quota error");
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn upsert_sends_ndjson() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path(
                "/records/namespaces/default/upsert",
            ))
            .and(wiremock::matchers::header(
                "Content-Type",
                "application/x-ndjson",
            ))
            .and(wiremock::matchers::body_string_contains("chunk_text"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = VectorClient::new("pc-key");
        let records = vec![
            ChunkRecord {
                id: "abc123def456-0".into(),
                chunk_text: "Acme sells widgets.".into(),
                url: "https://www.acme.com/".into(),
            },
            ChunkRecord {
                id: "abc123def456-1".into(),
                chunk_text: "Widgets ship worldwide.".into(),
                url: "https://www.acme.com/".into(),
            },
        ];
        client
            .upsert_records(&server.uri(), DEFAULT_NAMESPACE, &records)
            .await
            .expect("upsert");
    }

    #[tokio::test]
    async fn search_parses_hits() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path(
                "/records/namespaces/default/search",
            ))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "result": {
                        "hits": [
                            {
                                "_id": "abc-0",
                                "_score": 0.91,
                                "fields": {
                                    "chunk_text": "Acme sells widgets.",
                                    "url": "https://www.acme.com/products"
                                }
                            },
                            {
                                "_id": "abc-1",
                                "_score": 0.72,
                                "fields": { "chunk_text": "Founded in 1999." }
                            }
                        ]
                    }
                }),
            ))
            .mount(&server)
            .await;

        let client = VectorClient::new("pc-key");
        let hits = client
            .search(&server.uri(), DEFAULT_NAMESPACE, "what do they sell", 5)
            .await
            .expect("search");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://www.acme.com/products");
        assert_eq!(hits[0].text, "Acme sells widgets.");
        assert!(hits[0].score > hits[1].score);
        // Hits without a url field fall back to the unknown marker
        assert_eq!(hits[1].url, "unknown");
    }

    #[tokio::test]
    async fn upsert_skips_empty_batches() {
        // No server: an empty batch must not issue a request
        let client = VectorClient::new("pc-key");
        client
            .upsert_records("http://127.0.0.1:1", DEFAULT_NAMESPACE, &[])
            .await
            .expect("no-op upsert");
    }
}
