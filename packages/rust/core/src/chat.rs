//! Retrieval-grounded chat pipeline with per-thread history.

use tracing::{debug, info, instrument, warn};
use url::Url;

use siteagent_shared::{ChatMessage, ChatReply, ChatRole, Result, SiteAgentError};
use siteagent_storage::SiteRecord;
use siteagent_vector::DEFAULT_NAMESPACE;

use crate::prompts;
use crate::services::{Services, ensure_site};

/// Thread used when the caller does not name one.
pub const DEFAULT_THREAD_ID: &str = "default_thread";

/// Source label used when the model reports none.
const FALLBACK_SOURCE: &str = "Homepage content analysis";

/// Persisted turns loaded when the caller supplies no history.
const HISTORY_LIMIT: u32 = 20;

/// Result of one chat turn.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// The site the conversation is about.
    pub url: Url,
    /// The user's question, echoed back.
    pub query: String,
    /// The assistant's grounded answer.
    pub reply: String,
    /// Passages (quotes or summaries) the answer drew on.
    pub sources: Vec<String>,
    /// The thread the turn was recorded under.
    pub thread_id: String,
}

/// Answer a question about a site, grounded in its indexed content.
///
/// Context comes from the site's vector index; when the index is missing or
/// empty the start page is fetched fresh instead. History comes from the
/// request when supplied, otherwise from the thread's persisted turns. Both
/// sides of the exchange are appended to the thread afterwards.
#[instrument(skip_all, fields(url = %url, thread = thread_id.unwrap_or(DEFAULT_THREAD_ID)))]
pub async fn chat_with_site(
    services: &Services,
    url: &Url,
    query: &str,
    thread_id: Option<&str>,
    history: Option<Vec<ChatMessage>>,
) -> Result<ChatOutcome> {
    let site = ensure_site(services, url).await?;

    let external_id = thread_id.unwrap_or(DEFAULT_THREAD_ID);
    let thread_row = services
        .storage
        .get_or_create_thread(&site.id, external_id)
        .await?;

    // --- Context: vector retrieval, falling back to a fresh page fetch ---
    let mut context = retrieve_context(services, &site, query).await;
    if context.is_empty() {
        debug!("no retrieval context, fetching start page");
        context = fallback_context(services, url, &site).await?;
    }

    // --- History: request-supplied turns win over persisted state ---
    let history = match history {
        Some(turns) => turns,
        None => {
            services
                .storage
                .list_messages(&thread_row, HISTORY_LIMIT)
                .await?
        }
    };

    // --- Grounded completion ---
    let prompt = prompts::chat_prompt(&context, &history, query);
    let completion = services.llm.generate(&services.model_id, &prompt).await?;
    let reply: ChatReply = prompts::parse_json_response(&completion.text)?;

    let sources = if reply.context_sources.is_empty() {
        vec![FALLBACK_SOURCE.to_string()]
    } else {
        reply.context_sources
    };

    // --- Record the exchange ---
    services
        .storage
        .append_message(&thread_row, ChatRole::User, query)
        .await?;
    services
        .storage
        .append_message(&thread_row, ChatRole::Assistant, &reply.agent_response)
        .await?;

    info!(
        thread = external_id,
        sources = sources.len(),
        tokens_in = completion.tokens_in,
        tokens_out = completion.tokens_out,
        "chat turn complete"
    );

    Ok(ChatOutcome {
        url: url.clone(),
        query: query.to_string(),
        reply: reply.agent_response,
        sources,
        thread_id: external_id.to_string(),
    })
}

/// Query the site's vector index. Any failure degrades to an empty context.
async fn retrieve_context(services: &Services, site: &SiteRecord, query: &str) -> String {
    let Some(vector) = &services.vector else {
        return String::new();
    };

    let desc = match vector.describe_index(&site.index_name).await {
        Ok(Some(desc)) if desc.ready => desc,
        Ok(_) => {
            warn!(index = %site.index_name, "no ready index for site");
            return String::new();
        }
        Err(e) => {
            warn!(index = %site.index_name, error = %e, "index lookup failed");
            return String::new();
        }
    };

    match vector
        .search(&desc.host, DEFAULT_NAMESPACE, query, services.retrieval.top_k)
        .await
    {
        Ok(hits) => {
            debug!(hits = hits.len(), "retrieved context passages");
            prompts::format_context(&hits)
        }
        Err(e) => {
            warn!(index = %site.index_name, error = %e, "retrieval query failed");
            String::new()
        }
    }
}

/// Fetch and extract the start page as last-resort context.
async fn fallback_context(services: &Services, url: &Url, site: &SiteRecord) -> Result<String> {
    let crawler = services.crawler()?;
    let page = crawler.fetch_one(url, &site.id).await.map_err(|e| {
        SiteAgentError::validation(format!("failed to fetch the website: {e}"))
    })?;

    let extracted = siteagent_extract::extract(&page.html);
    Ok(siteagent_extract::truncate_chars(
        &extracted.text,
        services.retrieval.max_context_chars,
    ))
}
