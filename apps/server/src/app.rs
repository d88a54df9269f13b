//! Application setup: router, middleware layers, and shared state.

use std::sync::Arc;

use axum::http::Method;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use siteagent_core::Services;

use crate::auth::require_bearer;
use crate::routes;

/// Rate quotas per client IP: one analyze per 12 s (5/min) with a burst of
/// 5, one chat per 6 s (10/min) with a burst of 10.
const ANALYZE_REPLENISH_SECS: u64 = 12;
const ANALYZE_BURST: u32 = 5;
const CHAT_REPLENISH_SECS: u64 = 6;
const CHAT_BURST: u32 = 10;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub auth_token: String,
}

/// Build the axum application router.
///
/// `/analyze` and `/chat` sit behind bearer auth and per-route rate limits;
/// `/` and `/health` are public.
pub fn build_app(services: Arc<Services>, auth_token: String) -> Router {
    let state = AppState {
        services,
        auth_token,
    };

    let analyze_limit = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(ANALYZE_REPLENISH_SECS)
            .burst_size(ANALYZE_BURST)
            .use_headers() // honor X-Forwarded-For behind proxies
            .finish()
            .expect("valid rate limiter configuration"),
    );
    let chat_limit = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(CHAT_REPLENISH_SECS)
            .burst_size(CHAT_BURST)
            .use_headers()
            .finish()
            .expect("valid rate limiter configuration"),
    );

    let protected = Router::new()
        .route(
            "/analyze",
            post(routes::analyze).layer(GovernorLayer {
                config: analyze_limit,
            }),
        )
        .route(
            "/chat",
            post(routes::chat).layer(GovernorLayer { config: chat_limit }),
        )
        // Outermost on these routes: unauthorized calls never reach the limiter
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ));

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .merge(protected)
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
