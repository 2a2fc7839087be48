//! Episodes API endpoint

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use super::{error_message, error_status, FeedQuery};
use crate::AppState;

/// Create episodes routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/episodes", get(get_episodes))
}

/// GET /api/episodes - Feed metadata and normalized episodes
async fn get_episodes(
    State(state): State<AppState>,
    Query(params): Query<FeedQuery>,
) -> impl IntoResponse {
    match state
        .channel
        .load(
            params.rss.as_deref(),
            params.force_refresh(),
            state.api_description_chars,
        )
        .await
    {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => (
            error_status(&e),
            Json(serde_json::json!({
                "error": error_message(&e)
            })),
        )
            .into_response(),
    }
}
