use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use adapter::database::{connect_database_with, setup_schema};
use anyhow::{Context, Result};
use api::route::{book::build_book_routers, circulation::build_circulation_routers};
use axum::Router;
use registry::{AppRegistry, AppRegistryImpl};
use shared::config::AppConfig;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    bootstrap().await
}

fn init_logger() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

async fn bootstrap() -> Result<()> {
    let app_config = AppConfig::from_env();
    let pool = connect_database_with(&app_config.database).await?;
    setup_schema(&pool).await?;

    let registry: AppRegistry = Arc::new(AppRegistryImpl::new(pool));

    let app = Router::new()
        .merge(build_circulation_routers())
        .merge(build_book_routers())
        .layer(TraceLayer::new_for_http())
        .with_state(registry);

    let addr = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), app_config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .context("failed to bind the listen address")?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app)
        .await
        .context("failed to serve the application")
}
