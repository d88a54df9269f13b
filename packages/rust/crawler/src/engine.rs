//! Concurrent, scope-aware web crawler engine.
//!
//! The crawler starts from a given URL, performs BFS traversal within the
//! start host, respects depth/page/concurrency/rate limits, and records
//! fetched pages via the storage layer.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use siteagent_shared::{CrawlConfig, PageMeta, Result, SiteAgentError};
use siteagent_storage::Storage;

/// Browser-like User-Agent: some sites refuse requests from obvious bots.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Per-request timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// CrawlOutcome
// ---------------------------------------------------------------------------

/// Summary of a completed crawl operation.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Number of pages successfully fetched.
    pub pages_fetched: usize,
    /// Number of pages skipped (out of scope, dedup, budget, error).
    pub pages_skipped: usize,
    /// Errors encountered (URL, error message).
    pub errors: Vec<(String, String)>,
    /// Total duration of the crawl.
    pub duration: Duration,
}

/// A fetched page with its raw HTML and outbound links.
#[derive(Debug, Clone)]
pub struct CrawledPage {
    /// Page metadata for storage.
    pub meta: PageMeta,
    /// Raw HTML body.
    pub html: String,
    /// Links found on this page.
    pub links: Vec<String>,
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Concurrent web crawler with scope-aware page fetching.
pub struct Crawler {
    config: CrawlConfig,
    client: Client,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_localhost: bool,
}

impl Crawler {
    /// Create a new crawler with the given configuration.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| SiteAgentError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            allow_localhost: false,
        })
    }

    /// Allow crawling localhost/private IPs (for integration tests).
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    /// Crawl starting from `start_url`, recording results in `storage`.
    ///
    /// Returns a summary of the crawl and the list of fetched pages.
    #[instrument(skip_all, fields(start_url = %start_url, site_id = %site_id))]
    pub async fn crawl(
        &self,
        start_url: &Url,
        site_id: &str,
        storage: &Storage,
    ) -> Result<(CrawlOutcome, Vec<CrawledPage>)> {
        let start_time = std::time::Instant::now();

        let crawl_job_id = storage.insert_crawl_job(site_id).await?;

        let scope = CrawlScope::new(start_url, &self.config);
        let visited = Arc::new(Mutex::new(HashSet::<String>::new()));
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency as usize));
        let max_pages = self.config.max_pages as usize;

        let mut queue: Vec<(Url, u32)> = vec![(start_url.clone(), 0)];
        let mut fetched_pages: Vec<CrawledPage> = Vec::new();
        let mut errors: Vec<(String, String)> = Vec::new();
        let mut pages_skipped: usize = 0;

        info!(
            depth = self.config.depth,
            max_pages = self.config.max_pages,
            concurrency = self.config.concurrency,
            rate_limit_ms = self.config.rate_limit_ms,
            "starting crawl"
        );

        while !queue.is_empty() && fetched_pages.len() < max_pages {
            // Take a batch bounded by both concurrency and the page budget
            let batch: Vec<(Url, u32)> = {
                let budget = max_pages - fetched_pages.len();
                let drain_count = queue
                    .len()
                    .min(self.config.concurrency as usize)
                    .min(budget);
                queue.drain(..drain_count).collect()
            };

            let mut handles = Vec::new();

            for (url, depth) in batch {
                let normalized = normalize_url(&url);

                // Check if already visited
                {
                    let mut vis = visited.lock().await;
                    if vis.contains(&normalized) {
                        pages_skipped += 1;
                        continue;
                    }
                    vis.insert(normalized.clone());
                }

                // Check scope
                if !scope.in_scope(&url) {
                    debug!(%url, "out of scope, skipping");
                    pages_skipped += 1;
                    continue;
                }

                // Check SSRF
                if !self.allow_localhost && is_ssrf_target(&url) {
                    warn!(%url, "SSRF protection: blocked");
                    pages_skipped += 1;
                    continue;
                }

                let client = self.client.clone();
                let sem = semaphore.clone();
                let rate_limit = self.config.rate_limit_ms;
                let site_id_owned = site_id.to_string();

                handles.push(tokio::spawn(async move {
                    let _permit = sem.acquire().await.expect("semaphore closed");

                    // Rate limiting
                    if rate_limit > 0 {
                        tokio::time::sleep(Duration::from_millis(rate_limit)).await;
                    }

                    fetch_page(&client, &url, depth, &site_id_owned).await
                }));
            }

            // Collect results
            for handle in handles {
                match handle.await {
                    Ok(Ok((page, depth))) => {
                        // Enqueue child links if within depth
                        if depth < self.config.depth {
                            for link in &page.links {
                                if let Ok(link_url) = Url::parse(link) {
                                    queue.push((link_url, depth + 1));
                                }
                            }
                        }

                        if let Err(e) = storage.upsert_page(&page.meta).await {
                            warn!(url = %page.meta.url, error = %e, "failed to store page");
                            errors.push((page.meta.url.clone(), e.to_string()));
                        }

                        fetched_pages.push(page);
                    }
                    Ok(Err(e)) => {
                        errors.push(("unknown".into(), e.to_string()));
                        pages_skipped += 1;
                    }
                    Err(e) => {
                        errors.push(("task".into(), e.to_string()));
                        pages_skipped += 1;
                    }
                }
            }
        }

        // Whatever is still queued fell outside the page budget
        pages_skipped += queue.len();

        let duration = start_time.elapsed();

        let stats = serde_json::json!({
            "status": if errors.is_empty() { "completed" } else { "completed_with_errors" },
            "pages_fetched": fetched_pages.len(),
            "pages_skipped": pages_skipped,
            "errors": errors.len(),
        });
        let _ = storage
            .update_crawl_job(&crawl_job_id, &stats.to_string())
            .await;

        let outcome = CrawlOutcome {
            pages_fetched: fetched_pages.len(),
            pages_skipped,
            errors,
            duration,
        };

        info!(
            pages_fetched = outcome.pages_fetched,
            pages_skipped = outcome.pages_skipped,
            errors = outcome.errors.len(),
            duration_ms = outcome.duration.as_millis(),
            "crawl completed"
        );

        Ok((outcome, fetched_pages))
    }

    /// Fetch a single page without BFS expansion (used for chat fallback context).
    pub async fn fetch_one(&self, url: &Url, site_id: &str) -> Result<CrawledPage> {
        if !self.allow_localhost && is_ssrf_target(url) {
            return Err(SiteAgentError::validation(format!(
                "refusing to fetch blocked address: {url}"
            )));
        }
        let (page, _) = fetch_page(&self.client, url, 0, site_id).await?;
        Ok(page)
    }
}

// ---------------------------------------------------------------------------
// Scope checking
// ---------------------------------------------------------------------------

/// Determines which URLs are "in scope" for a crawl.
struct CrawlScope {
    /// Host that URLs must match.
    base_host: String,
    /// Exclude patterns (if URL path matches any, it's excluded).
    exclude_patterns: Vec<regex::Regex>,
}

impl CrawlScope {
    fn new(start_url: &Url, config: &CrawlConfig) -> Self {
        let base_host = start_url.host_str().unwrap_or("").to_string();

        let exclude_patterns = config
            .exclude_patterns
            .iter()
            .filter_map(|p| glob_to_regex(p))
            .collect();

        Self {
            base_host,
            exclude_patterns,
        }
    }

    fn in_scope(&self, url: &Url) -> bool {
        // Must be http/https
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        // Must stay on the start host
        if url.host_str().unwrap_or("") != self.base_host {
            return false;
        }

        let path = url.path();
        for pattern in &self.exclude_patterns {
            if pattern.is_match(path) {
                return false;
            }
        }

        true
    }
}

/// Convert a glob-like pattern to a regex.
fn glob_to_regex(pattern: &str) -> Option<regex::Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", ".");
    regex::Regex::new(&format!("^{escaped}$")).ok()
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    // Block private/loopback IPs
    if let Some(host) = url.host_str() {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return is_private_ip(&ip);
        }
        // Block known local hostnames
        if host == "localhost"
            || host == "127.0.0.1"
            || host == "[::1]"
            || host.ends_with(".local")
            || host.ends_with(".internal")
        {
            return true;
        }
    }

    false
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
                // 192.0.0.0/24
                || (v4.octets()[0] == 192 && v4.octets()[1] == 0 && v4.octets()[2] == 0)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

// ---------------------------------------------------------------------------
// Page fetching
// ---------------------------------------------------------------------------

/// Fetch a single page and collect its metadata and links.
async fn fetch_page(
    client: &Client,
    url: &Url,
    depth: u32,
    site_id: &str,
) -> Result<(CrawledPage, u32)> {
    debug!(%url, depth, "fetching page");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| SiteAgentError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    let status_code = status.as_u16();

    if !status.is_success() {
        return Err(SiteAgentError::Network(format!("{url}: HTTP {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| SiteAgentError::Network(format!("{url}: body read failed: {e}")))?;

    let doc = Html::parse_document(&body);
    let links = extract_links(&doc, url);
    let content_hash = compute_hash(&body);
    let title = extract_page_title(&doc);

    let meta = PageMeta {
        id: Uuid::now_v7().to_string(),
        site_id: site_id.to_string(),
        url: url.to_string(),
        title,
        content_hash,
        fetched_at: Utc::now(),
        status_code: Some(status_code),
        content_len: Some(body.len()),
    };

    Ok((
        CrawledPage {
            meta,
            html: body,
            links,
        },
        depth,
    ))
}

/// Title from `<title>`, falling back to the first `<h1>`.
fn extract_page_title(doc: &Html) -> Option<String> {
    let title_sel = Selector::parse("title").expect("valid selector");
    let h1_sel = Selector::parse("h1").expect("valid selector");

    let text_of = |el: scraper::ElementRef<'_>| {
        let text = el.text().collect::<String>().trim().to_string();
        (!text.is_empty()).then_some(text)
    };

    doc.select(&title_sel)
        .next()
        .and_then(text_of)
        .or_else(|| doc.select(&h1_sel).next().and_then(text_of))
}

/// Extract all links from a document, resolved against the base URL.
fn extract_links(doc: &Html, base_url: &Url) -> Vec<String> {
    let link_sel = Selector::parse("a[href]").expect("valid selector");
    let mut links = Vec::new();

    for el in doc.select(&link_sel) {
        if let Some(href) = el.value().attr("href") {
            // Skip anchors, javascript:, mailto:
            if href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
            {
                continue;
            }

            // Resolve relative URLs
            if let Ok(resolved) = base_url.join(href) {
                let mut resolved = resolved;
                resolved.set_fragment(None);
                links.push(resolved.to_string());
            }
        }
    }

    links
}

/// Normalize a URL for deduplication (strip fragment, trailing slash).
fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    let mut s = normalized.to_string();
    // Remove trailing slash for consistency (except root path)
    if s.ends_with('/') && s.matches('/').count() > 3 {
        s.pop();
    }
    s
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
