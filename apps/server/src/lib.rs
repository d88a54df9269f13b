//! REST surface for siteagent.
//!
//! Exposes the analyze and chat pipelines behind bearer-token auth with
//! per-route rate limiting.

pub mod app;
pub mod auth;
pub mod error;
pub mod routes;

pub use app::{AppState, build_app};
