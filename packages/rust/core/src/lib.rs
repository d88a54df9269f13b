//! Core pipelines for siteagent.
//!
//! Ties the crawler, extractor, LLM client, vector client, and storage into
//! the two end-to-end workflows: [`analyze::analyze_site`] and
//! [`chat::chat_with_site`].

pub mod analyze;
pub mod chat;
pub mod chunk;
pub mod prompts;
pub mod services;

pub use analyze::{AnalyzeOutcome, analyze_site};
pub use chat::{ChatOutcome, DEFAULT_THREAD_ID, chat_with_site};
pub use chunk::TextSplitter;
pub use services::Services;
