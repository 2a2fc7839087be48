//! Error types for the channel pipeline

use thiserror::Error;

use channel_feed::UrlRejection;

use crate::feed_cache::FeedCacheError;

/// Why a channel request could not be served
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The caller-supplied feed URL was refused
    #[error("{0}")]
    InvalidUrl(#[from] UrlRejection),

    /// The feed could not be fetched or parsed
    #[error("failed to load feed: {0}")]
    Upstream(#[from] FeedCacheError),
}

impl ChannelError {
    /// Whether the caller is at fault (as opposed to the upstream feed)
    pub fn is_client_error(&self) -> bool {
        matches!(self, ChannelError::InvalidUrl(_))
    }
}
