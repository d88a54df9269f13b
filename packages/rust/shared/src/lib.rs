//! Shared types, error model, and configuration for siteagent.
//!
//! This crate is the foundation depended on by all other siteagent crates.
//! It provides:
//! - [`SiteAgentError`] — the unified error type
//! - Domain types ([`AnalysisReport`], [`ChatMessage`], [`PageMeta`], [`SiteId`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading, secret resolution)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, CrawlPoliciesConfig, DefaultsConfig, GeminiConfig, PineconeConfig,
    RetrievalConfig, ServerConfig, auth_token, config_dir, config_file_path, gemini_api_key,
    init_config, load_config, load_config_from, pinecone_api_key,
};
pub use error::{Result, SiteAgentError};
pub use types::{
    AnalysisReport, ChatMessage, ChatReply, ChatRole, CompanyInfo, ContactInfo, ExtractedAnswer,
    INFO_NOT_FOUND, PageMeta, SiteId,
};
