//! Feed Channel Server
//!
//! Serves an RSS/Atom feed as a TV-style channel page and as a JSON
//! episodes API.

mod config;
mod routes;
mod views;

use axum::http::{header, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use channel_feed::{FeedClient, FeedSource};
use channel_services::{ChannelService, FeedCache};

use crate::config::AppConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub channel: Arc<ChannelService>,
    /// Description budget for the HTML page
    pub page_description_chars: usize,
    /// Description budget for the JSON API
    pub api_description_chars: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,channel_api=debug")),
        )
        .init();

    info!("Starting Feed Channel server");

    let config = AppConfig::from_env()?;
    info!(
        "Default feed: {} (caller feeds {}, {} allowlist entries)",
        config.default_feed_url,
        if config.allow_feed_query { "enabled" } else { "disabled" },
        config.allowlist.len()
    );

    // Redirect hops are checked against the same policy as caller URLs
    let client = FeedClient::new(config.fetch_timeout, config.url_policy())?;
    let source: Arc<dyn FeedSource> = Arc::new(client);

    let cache = Arc::new(FeedCache::new(config.cache_config()));
    cache.spawn_sweeper(config.sweep_interval());

    let channel = Arc::new(ChannelService::new(config.channel_config(), cache, source));

    let state = AppState {
        channel,
        page_description_chars: config.page_description_chars,
        api_description_chars: config.api_description_chars,
    };

    // Configure CORS for browser clients of the API
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
