//! Channel Service
//!
//! Runs a request through the channel pipeline: pick the feed URL (the
//! configured default, or a validated caller-supplied one), load it through
//! the feed cache and normalize its items into episodes.

use std::sync::Arc;

use tracing::{debug, error, instrument, warn};

use channel_core::{EpisodesResponse, FeedInfo};
use channel_feed::{normalize, FeedSource, NormalizeOptions, UrlPolicy};

use crate::error::ChannelError;
use crate::feed_cache::{CacheStats, FeedCache};

/// Configuration for ChannelService
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Feed served when the caller does not pick one
    pub default_feed_url: String,
    /// Whether callers may pick their own feed URL
    pub allow_feed_query: bool,
    /// Policy applied to caller-supplied feed URLs
    pub url_policy: UrlPolicy,
    /// Maximum number of feed items turned into episodes
    pub episode_limit: usize,
}

/// Feed-to-episodes pipeline shared by the page and API handlers
pub struct ChannelService {
    config: ChannelConfig,
    cache: Arc<FeedCache>,
    source: Arc<dyn FeedSource>,
}

impl ChannelService {
    /// Create a new ChannelService
    pub fn new(config: ChannelConfig, cache: Arc<FeedCache>, source: Arc<dyn FeedSource>) -> Self {
        Self {
            config,
            cache,
            source,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The feed URL to load for a request
    ///
    /// A caller-supplied URL must pass the policy; a rejected URL is an
    /// error and never falls back to the default feed. When caller URLs are
    /// disabled the parameter is ignored.
    pub fn resolve_feed_url(&self, requested: Option<&str>) -> Result<String, ChannelError> {
        let requested = requested.map(str::trim).filter(|url| !url.is_empty());

        match requested {
            Some(url) if self.config.allow_feed_query => {
                let feed_url = self.config.url_policy.validate(url).map_err(|rejection| {
                    warn!("Rejected feed URL {:?}: {}", url, rejection);
                    rejection
                })?;
                Ok(feed_url.into_string())
            }
            Some(url) => {
                debug!("Ignoring feed URL {:?}: caller feed URLs are disabled", url);
                Ok(self.config.default_feed_url.clone())
            }
            None => Ok(self.config.default_feed_url.clone()),
        }
    }

    /// Load the episodes for a request
    #[instrument(skip(self))]
    pub async fn load(
        &self,
        requested: Option<&str>,
        force_refresh: bool,
        description_chars: usize,
    ) -> Result<EpisodesResponse, ChannelError> {
        let rss_url = self.resolve_feed_url(requested)?;

        let feed = self
            .cache
            .get(&rss_url, force_refresh, &self.source)
            .await
            .map_err(|e| {
                error!("Failed to load feed {}: {}", rss_url, e);
                e
            })?;

        let episodes = normalize(
            &feed.items,
            NormalizeOptions {
                limit: self.config.episode_limit,
                description_chars,
            },
        );

        debug!(
            "Normalized {} episodes from {} feed items ({})",
            episodes.len(),
            feed.items.len(),
            rss_url
        );

        Ok(EpisodesResponse {
            feed: FeedInfo {
                title: feed.title.clone().unwrap_or_default(),
                link: feed.link.clone().unwrap_or_default(),
                description: feed.description.clone().unwrap_or_default(),
                rss_url,
            },
            episodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use channel_core::{ParsedFeed, RawItem, RawMedia};
    use channel_feed::FeedError;
    use parking_lot::Mutex;

    use crate::feed_cache::{FeedCacheConfig, FeedCacheError};

    const DEFAULT_FEED: &str = "https://feeds.example.com/default.xml";

    /// Source that records requested URLs and serves a fixed item count
    struct RecordingSource {
        requested: Mutex<Vec<String>>,
        items: usize,
        failing: bool,
    }

    #[async_trait]
    impl FeedSource for RecordingSource {
        async fn fetch(&self, url: &str) -> Result<ParsedFeed, FeedError> {
            self.requested.lock().push(url.to_string());
            if self.failing {
                return Err(FeedError::ApiError {
                    status: 503,
                    message: "upstream down".to_string(),
                });
            }

            let items = (0..self.items)
                .map(|i| RawItem {
                    title: Some(format!("Episode {i}")),
                    enclosure: (i % 10 != 9)
                        .then(|| RawMedia::new(format!("http://cdn.example.com/{i}.mp3"), "audio/mpeg")),
                    ..RawItem::default()
                })
                .collect();

            Ok(ParsedFeed {
                title: Some("Test Channel".to_string()),
                link: Some("https://example.com".to_string()),
                description: None,
                items,
            })
        }
    }

    fn service(allow_feed_query: bool, allowlist: &[&str], items: usize, failing: bool) -> (ChannelService, Arc<RecordingSource>) {
        let source = Arc::new(RecordingSource {
            requested: Mutex::new(Vec::new()),
            items,
            failing,
        });
        let config = ChannelConfig {
            default_feed_url: DEFAULT_FEED.to_string(),
            allow_feed_query,
            url_policy: UrlPolicy::new(allowlist),
            episode_limit: 100,
        };
        let cache = Arc::new(FeedCache::new(FeedCacheConfig::default()));
        let service = ChannelService::new(config, cache, source.clone());
        (service, source)
    }

    #[tokio::test]
    async fn test_loads_default_feed() {
        let (service, source) = service(true, &[], 3, false);

        let response = service.load(None, false, 100).await.unwrap();

        assert_eq!(response.feed.title, "Test Channel");
        assert_eq!(response.feed.rss_url, DEFAULT_FEED);
        assert_eq!(response.feed.description, "");
        assert_eq!(response.episodes.len(), 3);
        assert_eq!(response.episodes[0].media_url, "https://cdn.example.com/0.mp3");
        assert_eq!(source.requested.lock().as_slice(), [DEFAULT_FEED]);
    }

    #[tokio::test]
    async fn test_caller_feed_is_canonicalized() {
        let (service, source) = service(true, &[], 1, false);

        let response = service
            .load(Some("HTTPS://Other.Example.com/rss#latest"), false, 100)
            .await
            .unwrap();

        assert_eq!(response.feed.rss_url, "https://other.example.com/rss");
        assert_eq!(source.requested.lock().as_slice(), ["https://other.example.com/rss"]);
    }

    #[tokio::test]
    async fn test_rejected_url_never_fetches() {
        let (service, source) = service(true, &["example.com"], 1, false);

        for url in ["http://127.0.0.1/feed", "https://evilexample.com/feed", "gopher://x"] {
            let err = service.load(Some(url), false, 100).await.unwrap_err();
            assert!(err.is_client_error(), "expected client error for {url}");
        }
        assert!(source.requested.lock().is_empty());
    }

    #[tokio::test]
    async fn test_caller_url_ignored_when_disabled() {
        let (service, source) = service(false, &[], 1, false);

        let response = service
            .load(Some("http://127.0.0.1/feed"), false, 100)
            .await
            .unwrap();

        assert_eq!(response.feed.rss_url, DEFAULT_FEED);
        assert_eq!(source.requested.lock().as_slice(), [DEFAULT_FEED]);
    }

    #[tokio::test]
    async fn test_blank_caller_url_uses_default() {
        let (service, _source) = service(true, &[], 1, false);
        assert_eq!(service.resolve_feed_url(Some("   ")).unwrap(), DEFAULT_FEED);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_server_error() {
        let (service, _source) = service(true, &[], 1, true);

        let err = service.load(None, false, 100).await.unwrap_err();
        assert!(!err.is_client_error());
        assert!(matches!(err, ChannelError::Upstream(FeedCacheError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_episode_limit_and_filtering() {
        let (service, _source) = service(true, &[], 150, false);

        let response = service.load(None, false, 100).await.unwrap();

        // Every tenth item has no media: 10 of the first 100 are dropped
        assert_eq!(response.episodes.len(), 90);
        assert_eq!(response.episodes[9].title, "Episode 10");
        assert!(response.episodes.iter().enumerate().all(|(i, e)| e.id == i));
    }

    #[tokio::test]
    async fn test_second_load_served_from_cache() {
        let (service, source) = service(true, &[], 1, false);

        service.load(None, false, 100).await.unwrap();
        service.load(None, false, 100).await.unwrap();
        assert_eq!(source.requested.lock().len(), 1);

        service.load(None, true, 100).await.unwrap();
        assert_eq!(source.requested.lock().len(), 2);
        assert_eq!(service.cache_stats().hits, 1);
    }
}
