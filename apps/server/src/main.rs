//! siteagent REST server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

use siteagent_core::Services;
use siteagent_server::build_app;
use siteagent_shared::{auth_token, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    init_tracing();

    let config = load_config()?;
    let token = auth_token(&config)?;
    let services = Arc::new(Services::from_config(&config).await?);

    let app = build_app(services, token);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "siteagent server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("siteagent=info,tower_http=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();
}
