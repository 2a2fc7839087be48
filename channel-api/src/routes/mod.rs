//! Route definitions

mod episodes;
mod health;
mod page;

use axum::{http::StatusCode, Router};
use serde::Deserialize;

use channel_services::ChannelError;

use crate::AppState;

/// Query parameters shared by the page and the episodes API
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    /// Caller-supplied feed URL
    pub rss: Option<String>,
    /// Bypass the cache when truthy (`1`, `true`, `yes`)
    pub refresh: Option<String>,
}

impl FeedQuery {
    pub fn force_refresh(&self) -> bool {
        self.refresh.as_deref().is_some_and(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            )
        })
    }
}

/// Status code reported for a failed channel load
fn error_status(err: &ChannelError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    }
}

/// Message shown to the caller for a failed channel load
///
/// Rejections carry their reason; upstream details stay in the logs.
fn error_message(err: &ChannelError) -> String {
    if err.is_client_error() {
        err.to_string()
    } else {
        "Failed to load feed".to_string()
    }
}

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(episodes::routes())
        .merge(health::routes())
}

/// Create the HTML page routes (separate from API)
pub fn page_routes() -> Router<AppState> {
    page::routes()
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .merge(page_routes())
        .with_state(state)
}
