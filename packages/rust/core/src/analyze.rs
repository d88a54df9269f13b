//! End-to-end analyze pipeline: URL → crawl → extract → insights → index.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use url::Url;

use siteagent_shared::{AnalysisReport, Result, RetrievalConfig, SiteAgentError};
use siteagent_vector::{
    ChunkRecord, DEFAULT_NAMESPACE, IndexSpec, VectorClient, chunk_record_id,
};

use crate::chunk::TextSplitter;
use crate::prompts;
use crate::services::{Services, ensure_site};

/// Result of the analyze pipeline.
#[derive(Debug, Clone)]
pub struct AnalyzeOutcome {
    /// The analyzed start URL.
    pub url: Url,
    /// Structured business insights from the model.
    pub report: AnalysisReport,
    /// Pages fetched during the bounded crawl.
    pub pages_crawled: usize,
    /// Chunks upserted into the site's vector index (0 when disabled).
    pub chunks_indexed: usize,
    /// When the analysis completed.
    pub generated_at: DateTime<Utc>,
}

/// Crawl a site, ask the model for structured insights, and index the
/// scraped content for follow-up chat.
#[instrument(skip_all, fields(url = %url))]
pub async fn analyze_site(
    services: &Services,
    url: &Url,
    questions: &[String],
) -> Result<AnalyzeOutcome> {
    let site = ensure_site(services, url).await?;

    // --- Crawl ---
    let crawler = services.crawler()?;
    let (outcome, pages) = crawler.crawl(url, &site.id, &services.storage).await?;

    if pages.is_empty() {
        let detail = outcome
            .errors
            .first()
            .map(|(_, e)| format!(": {e}"))
            .unwrap_or_default();
        return Err(SiteAgentError::validation(format!(
            "failed to fetch the website{detail}"
        )));
    }

    services
        .storage
        .mark_site_crawled(&site.id, pages.len() as u32)
        .await?;

    // --- Extract text ---
    let page_texts: Vec<(String, String)> = pages
        .iter()
        .map(|p| (p.meta.url.clone(), siteagent_extract::extract(&p.html).text))
        .collect();

    // --- Model analysis of the start page ---
    let start_text = siteagent_extract::truncate_chars(
        &page_texts[0].1,
        services.retrieval.max_context_chars,
    );
    let prompt = prompts::analysis_prompt(&start_text, questions);
    let completion = services.llm.generate(&services.model_id, &prompt).await?;
    let report: AnalysisReport = prompts::parse_json_response(&completion.text)?;

    // --- Index content for RAG (best-effort; never fails the analysis) ---
    let chunks_indexed = match &services.vector {
        Some(vector) => {
            match index_pages(
                vector,
                &services.index_spec,
                &site.index_name,
                &services.retrieval,
                &page_texts,
            )
            .await
            {
                Ok(count) => count,
                Err(e) => {
                    warn!(index = %site.index_name, error = %e, "indexing failed");
                    0
                }
            }
        }
        None => {
            debug!("vector client not configured, skipping indexing");
            0
        }
    };

    // --- Persist the report ---
    let report_json = serde_json::to_string(&report)
        .map_err(|e| SiteAgentError::parse(format!("report serialization: {e}")))?;
    services
        .storage
        .insert_analysis(&site.id, &report_json, &services.model_id)
        .await?;

    info!(
        pages_crawled = outcome.pages_fetched,
        chunks_indexed,
        tokens_in = completion.tokens_in,
        tokens_out = completion.tokens_out,
        "analysis complete"
    );

    Ok(AnalyzeOutcome {
        url: url.clone(),
        report,
        pages_crawled: outcome.pages_fetched,
        chunks_indexed,
        generated_at: Utc::now(),
    })
}

/// Chunk every page and upsert the records into the site's inference index.
async fn index_pages(
    vector: &VectorClient,
    spec: &IndexSpec,
    index_name: &str,
    retrieval: &RetrievalConfig,
    page_texts: &[(String, String)],
) -> Result<usize> {
    let host = vector.ensure_index(index_name, spec).await?;
    let splitter = TextSplitter::new(retrieval.chunk_size, retrieval.chunk_overlap);

    let mut total = 0;
    for (page_url, text) in page_texts {
        if text.is_empty() {
            warn!(url = %page_url, "skipping empty page content");
            continue;
        }

        let records: Vec<ChunkRecord> = splitter
            .split(text)
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| ChunkRecord {
                id: chunk_record_id(page_url, i),
                chunk_text: chunk,
                url: page_url.clone(),
            })
            .collect();

        debug!(url = %page_url, chunks = records.len(), "upserting page chunks");
        vector
            .upsert_records(&host, DEFAULT_NAMESPACE, &records)
            .await?;
        total += records.len();
    }

    info!(index = index_name, chunks = total, "indexing complete");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteagent_llm::GeminiClient;
    use siteagent_shared::{CrawlConfig, RetrievalConfig};
    use siteagent_storage::Storage;
    use uuid::Uuid;

    async fn test_services(gemini_base: &str, vector: Option<VectorClient>) -> Services {
        let tmp = std::env::temp_dir().join(format!("sa-analyze-{}.db", Uuid::now_v7()));
        Services {
            storage: Storage::open(&tmp).await.expect("open test db"),
            llm: GeminiClient::new("test-key").with_base_url(gemini_base),
            vector,
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
        }
    }

    async fn mount_gemini(server: &wiremock::MockServer, text: &str) {
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path(
                "/models/gemini-2.5-flash:generateContent",
            ))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}],
                    "usageMetadata": {"promptTokenCount": 50, "candidatesTokenCount": 20}
                }),
            ))
            .mount(server)
            .await;
    }

    async fn mount_page(server: &wiremock::MockServer, path: &str, body: &str) {
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(path))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn analyze_crawls_and_parses_report() {
        let site = wiremock::MockServer::start().await;
        let gemini = wiremock::MockServer::start().await;

        mount_page(
            &site,
            "/",
            r#"<html><head><title>Acme</title></head><body>
                <p>Acme Corp builds logistics software.</p>
                <a href="/about">About</a>
            </body></html>"#,
        )
        .await;
        mount_page(
            &site,
            "/about",
            "<html><body><p>Founded in 1999 in Sydney.</p></body></html>",
        )
        .await;

        // Fenced output exercises the fallback parser
        mount_gemini(
            &gemini,
            "```json\n{\"company_info\": {\"industry\": \"Logistics software\", \"location\": \"Sydney\"}, \"extracted_answers\": [{\"question\": \"Founded?\", \"answer\": \"1999\"}]}\n```",
        )
        .await;

        let services = test_services(&gemini.uri(), None).await;
        let url = Url::parse(&site.uri()).unwrap();
        let outcome = analyze_site(&services, &url, &["Founded?".to_string()])
            .await
            .expect("analyze");

        assert_eq!(outcome.pages_crawled, 2);
        assert_eq!(outcome.chunks_indexed, 0);
        assert_eq!(
            outcome.report.company_info.industry.as_deref(),
            Some("Logistics software")
        );
        assert_eq!(outcome.report.extracted_answers.len(), 1);

        // Site row and analysis were persisted
        let host = url.host_str().unwrap();
        let site_row = services
            .storage
            .get_site_by_host(host)
            .await
            .unwrap()
            .expect("site row");
        assert_eq!(site_row.page_count, 2);
        let analysis = services
            .storage
            .latest_analysis(&site_row.id)
            .await
            .unwrap()
            .expect("analysis stored");
        assert!(analysis.report_json.contains("Logistics software"));
    }

    #[tokio::test]
    async fn analyze_indexes_chunks_when_vector_configured() {
        let site = wiremock::MockServer::start().await;
        let gemini = wiremock::MockServer::start().await;
        let vector = wiremock::MockServer::start().await;

        mount_page(
            &site,
            "/",
            "<html><body><p>Acme builds widgets for everyone.</p></body></html>",
        )
        .await;
        mount_gemini(&gemini, "{\"company_info\": {}}").await;

        let url = Url::parse(&site.uri()).unwrap();
        let index_name = siteagent_vector::index_name_for_url(&url);

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path(format!("/indexes/{index_name}")))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({
                    "name": index_name,
                    "host": vector.uri(),
                    "status": {"ready": true},
                    "embed": {"model": "llama-text-embed-v2"}
                }),
            ))
            .mount(&vector)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path(
                "/records/namespaces/default/upsert",
            ))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(1)
            .mount(&vector)
            .await;

        let vector_client = VectorClient::new("pc-key").with_control_base(vector.uri());
        let services = test_services(&gemini.uri(), Some(vector_client)).await;

        let outcome = analyze_site(&services, &url, &[]).await.expect("analyze");
        assert_eq!(outcome.chunks_indexed, 1);
    }

    #[tokio::test]
    async fn unreachable_site_is_a_validation_error() {
        let gemini = wiremock::MockServer::start().await;
        let services = test_services(&gemini.uri(), None).await;

        // Nothing is listening on this port
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let err = analyze_site(&services, &url, &[]).await.expect_err("fails");
        assert!(matches!(err, SiteAgentError::Validation { .. }));
        assert!(err.to_string().contains("failed to fetch the website"));
    }

    #[tokio::test]
    async fn unparseable_model_output_is_a_parse_error() {
        let site = wiremock::MockServer::start().await;
        let gemini = wiremock::MockServer::start().await;

        mount_page(&site, "/", "<html><body><p>Hello.</p></body></html>").await;
        mount_gemini(&gemini, "I could not produce JSON, sorry.").await;

        let services = test_services(&gemini.uri(), None).await;
        let url = Url::parse(&site.uri()).unwrap();
        let err = analyze_site(&services, &url, &[]).await.expect_err("fails");
        assert!(matches!(err, SiteAgentError::Parse { .. }));
    }
}
