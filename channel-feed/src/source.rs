//! The fetch-and-parse seam used by the feed cache

use async_trait::async_trait;
use channel_core::ParsedFeed;

use crate::error::FeedError;
use crate::feed_client::FeedClient;

/// Anything that can turn a feed URL into a parsed feed
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed, FeedError>;
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed, FeedError> {
        self.fetch_feed(url).await
    }
}
