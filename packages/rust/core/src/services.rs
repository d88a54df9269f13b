//! Shared service dependencies for the analyze and chat pipelines.

use std::path::PathBuf;

use url::Url;

use siteagent_crawler::Crawler;
use siteagent_llm::GeminiClient;
use siteagent_shared::{
    AppConfig, CrawlConfig, Result, RetrievalConfig, SiteAgentError, SiteId, gemini_api_key,
    pinecone_api_key,
};
use siteagent_storage::{SiteRecord, Storage};
use siteagent_vector::{IndexSpec, VectorClient, index_name_for_url};

/// Database file name under the configured data directory.
const DB_FILE_NAME: &str = "siteagent.db";

/// Everything the pipelines need: storage, API clients, and tuning knobs.
pub struct Services {
    pub storage: Storage,
    pub llm: GeminiClient,
    /// `None` when no vector credentials are configured; indexing and
    /// retrieval are skipped in that case.
    pub vector: Option<VectorClient>,
    pub model_id: String,
    pub index_spec: IndexSpec,
    pub crawl: CrawlConfig,
    pub retrieval: RetrievalConfig,
    /// Allow crawling localhost (integration tests with mock servers).
    pub allow_local_crawl: bool,
}

impl Services {
    /// Build services from the loaded config, resolving secrets from the
    /// environment and opening the embedded database.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let gemini_key = gemini_api_key(config)?;

        let vector = pinecone_api_key(config).map(VectorClient::new);
        if vector.is_none() {
            tracing::warn!(
                env = %config.pinecone.api_key_env,
                "vector API key not set, indexing and retrieval disabled"
            );
        }

        let db_path = PathBuf::from(&config.defaults.data_dir).join(DB_FILE_NAME);
        let storage = Storage::open(&db_path).await?;

        Ok(Self {
            storage,
            llm: GeminiClient::new(gemini_key),
            vector,
            model_id: config.gemini.model.clone(),
            index_spec: IndexSpec {
                cloud: config.pinecone.cloud.clone(),
                region: config.pinecone.region.clone(),
                embed_model: config.pinecone.embed_model.clone(),
            },
            crawl: CrawlConfig::from(config),
            retrieval: config.retrieval.clone(),
            allow_local_crawl: false,
        })
    }

    /// Build a crawler honoring the localhost override.
    pub(crate) fn crawler(&self) -> Result<Crawler> {
        let crawler = Crawler::new(self.crawl.clone())?;
        Ok(if self.allow_local_crawl {
            crawler.allow_localhost()
        } else {
            crawler
        })
    }
}

/// Look up the site row for a URL's host, creating it on first contact.
pub(crate) async fn ensure_site(services: &Services, url: &Url) -> Result<SiteRecord> {
    let host = url
        .host_str()
        .ok_or_else(|| SiteAgentError::validation(format!("URL has no host: {url}")))?;

    if let Some(site) = services.storage.get_site_by_host(host).await? {
        return Ok(site);
    }

    let id = SiteId::new().to_string();
    let index_name = index_name_for_url(url);
    services
        .storage
        .insert_site(&id, url.as_str(), host, &index_name)
        .await?;

    services
        .storage
        .get_site_by_host(host)
        .await?
        .ok_or_else(|| SiteAgentError::Storage("site row missing after insert".into()))
}
