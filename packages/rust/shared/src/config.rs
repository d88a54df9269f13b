//! Application configuration for siteagent.
//!
//! User config lives at `~/.siteagent/siteagent.toml`.
//! API keys and the REST auth token are referenced by env-var *name*;
//! the secrets themselves are never written to disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteAgentError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "siteagent.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".siteagent";

// ---------------------------------------------------------------------------
// Config structs (matching siteagent.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// REST server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Gemini completion API settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Pinecone vector-search settings.
    #[serde(default)]
    pub pinecone: PineconeConfig,

    /// Crawl bounds and policies.
    #[serde(default)]
    pub crawl: CrawlPoliciesConfig,

    /// Chunking and retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory for the embedded database (relative paths resolve against cwd).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "var/data".into()
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the REST server.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Name of the env var holding the bearer auth token.
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            auth_token_env: default_auth_token_env(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_auth_token_env() -> String {
    "SECRET_KEY".into()
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    /// Completion model to use.
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            model: default_gemini_model(),
        }
    }
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_gemini_model() -> String {
    "gemini-2.5-flash".into()
}

/// `[pinecone]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeConfig {
    /// Name of the env var holding the API key. Indexing is skipped when unset.
    #[serde(default = "default_pinecone_key_env")]
    pub api_key_env: String,

    /// Serverless cloud provider for new indexes.
    #[serde(default = "default_cloud")]
    pub cloud: String,

    /// Serverless region for new indexes.
    #[serde(default = "default_region")]
    pub region: String,

    /// Hosted embedding model backing inference indexes.
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_pinecone_key_env(),
            cloud: default_cloud(),
            region: default_region(),
            embed_model: default_embed_model(),
        }
    }
}

fn default_pinecone_key_env() -> String {
    "PINECONE_API_KEY".into()
}
fn default_cloud() -> String {
    "aws".into()
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_embed_model() -> String {
    "llama-text-embed-v2".into()
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlPoliciesConfig {
    /// Maximum link depth from the start URL.
    #[serde(default = "default_crawl_depth")]
    pub depth: u32,

    /// Maximum number of pages fetched per crawl.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Maximum concurrent HTTP requests.
    #[serde(default = "default_crawl_concurrency")]
    pub concurrency: u32,

    /// Minimum ms between requests to the target host.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// URL path exclude patterns (glob-like).
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for CrawlPoliciesConfig {
    fn default() -> Self {
        Self {
            depth: default_crawl_depth(),
            max_pages: default_max_pages(),
            concurrency: default_crawl_concurrency(),
            rate_limit_ms: default_rate_limit(),
            exclude_patterns: Vec::new(),
        }
    }
}

fn default_crawl_depth() -> u32 {
    2
}
fn default_max_pages() -> u32 {
    10
}
fn default_crawl_concurrency() -> u32 {
    4
}
fn default_rate_limit() -> u64 {
    200
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Character overlap carried between adjacent chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Number of context passages retrieved per chat query.
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// Cap on page text fed into a single prompt.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_top_k() -> u32 {
    5
}
fn default_max_context_chars() -> usize {
    10_000
}

// ---------------------------------------------------------------------------
// Crawl config (runtime, merged from config file)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration handed to the crawler engine.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Maximum crawl depth from the start URL.
    pub depth: u32,
    /// Maximum pages fetched per crawl.
    pub max_pages: u32,
    /// Maximum concurrent HTTP requests.
    pub concurrency: u32,
    /// Rate limit in ms between requests.
    pub rate_limit_ms: u64,
    /// URL path exclude glob patterns.
    pub exclude_patterns: Vec<String>,
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            depth: config.crawl.depth,
            max_pages: config.crawl.max_pages,
            concurrency: config.crawl.concurrency,
            rate_limit_ms: config.crawl.rate_limit_ms,
            exclude_patterns: config.crawl.exclude_patterns.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.siteagent/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SiteAgentError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.siteagent/siteagent.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SiteAgentError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        SiteAgentError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SiteAgentError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SiteAgentError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SiteAgentError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

// ---------------------------------------------------------------------------
// Secret resolution
// ---------------------------------------------------------------------------

/// Read a non-empty env var, or fail with a pointer at the var name.
fn require_env(var_name: &str, what: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(SiteAgentError::config(format!(
            "{what} not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Resolve the Gemini API key. Required for every analyze/chat operation.
pub fn gemini_api_key(config: &AppConfig) -> Result<String> {
    require_env(&config.gemini.api_key_env, "Gemini API key")
}

/// Resolve the Pinecone API key. Optional: indexing and retrieval are
/// skipped when it is unset.
pub fn pinecone_api_key(config: &AppConfig) -> Option<String> {
    std::env::var(&config.pinecone.api_key_env)
        .ok()
        .filter(|v| !v.is_empty())
}

/// Resolve the REST bearer auth token.
pub fn auth_token(config: &AppConfig) -> Result<String> {
    require_env(&config.server.auth_token_env, "REST auth token")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("GEMINI_API_KEY"));
        assert!(toml_str.contains("gemini-2.5-flash"));
        assert!(toml_str.contains("llama-text-embed-v2"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.crawl.depth, 2);
        assert_eq!(parsed.crawl.max_pages, 10);
        assert_eq!(parsed.retrieval.chunk_size, 1000);
        assert_eq!(parsed.retrieval.chunk_overlap, 100);
        assert_eq!(parsed.server.port, 8000);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[crawl]
depth = 1
max_pages = 3

[gemini]
model = "gemini-2.0-flash"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.crawl.depth, 1);
        assert_eq!(config.crawl.max_pages, 3);
        assert_eq!(config.crawl.concurrency, 4);
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.gemini.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn crawl_config_from_app_config() {
        let app = AppConfig::default();
        let crawl = CrawlConfig::from(&app);
        assert_eq!(crawl.depth, 2);
        assert_eq!(crawl.max_pages, 10);
        assert_eq!(crawl.concurrency, 4);
        assert_eq!(crawl.rate_limit_ms, 200);
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.gemini.api_key_env = "SA_TEST_NONEXISTENT_KEY_98765".into();
        let result = gemini_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }

    #[test]
    fn pinecone_key_is_optional() {
        let mut config = AppConfig::default();
        config.pinecone.api_key_env = "SA_TEST_NONEXISTENT_KEY_43210".into();
        assert!(pinecone_api_key(&config).is_none());
    }
}
