//! TV channel page

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};

use super::{error_message, error_status, FeedQuery};
use crate::views;
use crate::AppState;

/// Create page routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(channel_page))
}

/// GET / - Server-rendered channel page
async fn channel_page(
    State(state): State<AppState>,
    Query(params): Query<FeedQuery>,
) -> impl IntoResponse {
    let allow_feed_query = state.channel.config().allow_feed_query;

    match state
        .channel
        .load(
            params.rss.as_deref(),
            params.force_refresh(),
            state.page_description_chars,
        )
        .await
    {
        Ok(response) => {
            let markup = views::channel_page(&response, allow_feed_query);
            (StatusCode::OK, Html(markup.into_string())).into_response()
        }
        Err(e) => {
            let status = error_status(&e);
            let markup = views::error_page(status, &error_message(&e), allow_feed_query);
            (status, Html(markup.into_string())).into_response()
        }
    }
}
