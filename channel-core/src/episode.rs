//! Episode data structures handed to the HTML and JSON renderers

use serde::{Deserialize, Serialize};

/// Whether an episode plays in an audio or a video element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized, playable episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeRecord {
    /// Position in the normalized list, starting at 0
    pub id: usize,
    pub title: String,
    /// RFC 3339 timestamp, or the feed's raw date string
    pub published_at: String,
    /// Plain text, truncated to the caller's budget
    pub description: String,
    pub media_url: String,
    /// MIME type, empty when the feed did not declare one
    pub media_type: String,
    pub kind: MediaKind,
    pub image_url: String,
    pub duration_label: String,
    pub link: String,
}

/// Feed-level metadata shown next to the episodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedInfo {
    pub title: String,
    pub link: String,
    pub description: String,
    /// The feed URL the episodes were loaded from
    pub rss_url: String,
}

/// Body of `GET /api/episodes`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodesResponse {
    pub feed: FeedInfo,
    pub episodes: Vec<EpisodeRecord>,
}
