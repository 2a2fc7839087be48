//! Feed Cache
//!
//! In-memory cache of parsed feeds keyed by a fingerprint of the feed URL.
//! Fresh entries are served without touching the network, and at most one
//! upstream fetch per fingerprint is in flight at any time: concurrent
//! callers queue behind the running fetch and reuse its result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use channel_core::ParsedFeed;
use channel_feed::{FeedError, FeedSource};

/// Default cache TTL (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default upstream fetch timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Fingerprints are the first 16 bytes of a SHA-256 digest, hex-encoded
const FINGERPRINT_BYTES: usize = 16;

/// Configuration for FeedCache
#[derive(Debug, Clone)]
pub struct FeedCacheConfig {
    /// How long a fetched feed is served without refetching
    pub ttl: Duration,
    /// Maximum number of cached feeds
    pub max_entries: usize,
    /// Upper bound on a single upstream fetch
    pub fetch_timeout: Duration,
    /// Serve an expired entry when its (non-forced) refresh fails
    pub serve_stale_on_error: bool,
}

impl Default for FeedCacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_entries: 256,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            serve_stale_on_error: true,
        }
    }
}

/// Errors surfaced by [`FeedCache::get`]
#[derive(Debug, thiserror::Error)]
pub enum FeedCacheError {
    #[error("upstream fetch failed: {0}")]
    Upstream(#[from] FeedError),

    #[error("upstream fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("fetch task failed: {0}")]
    Task(String),
}

/// Cached feed with metadata
struct CacheEntry {
    fetched_at: Instant,
    feed: Arc<ParsedFeed>,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub fetch_failures: u64,
    pub stale_served: u64,
}

/// In-memory feed cache with single-flight upstream fetches
pub struct FeedCache {
    config: FeedCacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// One async lock per fingerprint with a fetch running or queued
    in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    fetch_failures: AtomicU64,
    stale_served: AtomicU64,
}

impl FeedCache {
    /// Create a new FeedCache
    pub fn new(config: FeedCacheConfig) -> Self {
        info!(
            "Initializing feed cache (ttl: {:?}, max entries: {}, fetch timeout: {:?})",
            config.ttl, config.max_entries, config.fetch_timeout
        );

        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            stale_served: AtomicU64::new(0),
        }
    }

    /// Fixed-length cache key for a feed URL
    pub fn fingerprint(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        hex::encode(&digest[..FINGERPRINT_BYTES])
    }

    /// Get the parsed feed for `url`, fetching it through `source` when needed
    ///
    /// The fetch runs on its own task: a caller that goes away does not
    /// cancel it, and its result still lands in the cache.
    pub async fn get<S>(
        self: &Arc<Self>,
        url: &str,
        force_refresh: bool,
        source: &Arc<S>,
    ) -> Result<Arc<ParsedFeed>, FeedCacheError>
    where
        S: FeedSource + ?Sized + 'static,
    {
        let fingerprint = Self::fingerprint(url);
        let requested_at = Instant::now();

        if !force_refresh {
            if let Some(feed) = self.fresh_entry(&fingerprint) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache HIT for feed {} ({})", url, fingerprint);
                return Ok(feed);
            }
        }

        let cache = Arc::clone(self);
        let source = Arc::clone(source);
        let url = url.to_string();

        tokio::spawn(async move {
            cache
                .get_single_flight(&url, fingerprint, force_refresh, requested_at, &*source)
                .await
        })
        .await
        .map_err(|e| FeedCacheError::Task(e.to_string()))?
    }

    async fn get_single_flight<S>(
        &self,
        url: &str,
        fingerprint: String,
        force_refresh: bool,
        requested_at: Instant,
        source: &S,
    ) -> Result<Arc<ParsedFeed>, FeedCacheError>
    where
        S: FeedSource + ?Sized,
    {
        let flight = self.flight_lock(&fingerprint);
        let guard = Arc::clone(&flight).lock_owned().await;

        // Another caller may have fetched while we were queued
        let result = match self.reusable_entry(&fingerprint, force_refresh, requested_at) {
            Some(feed) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Reusing feed fetched while queued: {} ({})", url, fingerprint);
                Ok(feed)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Cache MISS for feed {} ({}), force_refresh: {}",
                    url, fingerprint, force_refresh
                );
                self.fetch_and_store(url, &fingerprint, force_refresh, source)
                    .await
            }
        };

        drop(guard);
        self.release_flight(&fingerprint, flight);
        result
    }

    async fn fetch_and_store<S>(
        &self,
        url: &str,
        fingerprint: &str,
        force_refresh: bool,
        source: &S,
    ) -> Result<Arc<ParsedFeed>, FeedCacheError>
    where
        S: FeedSource + ?Sized,
    {
        let timeout = self.config.fetch_timeout;

        let error = match tokio::time::timeout(timeout, source.fetch(url)).await {
            Ok(Ok(feed)) => {
                let feed = Arc::new(feed);
                self.store(fingerprint, Arc::clone(&feed));
                info!("Fetched feed {} ({} items)", url, feed.items.len());
                return Ok(feed);
            }
            Ok(Err(e)) => FeedCacheError::Upstream(e),
            Err(_) => FeedCacheError::Timeout(timeout),
        };

        self.fetch_failures.fetch_add(1, Ordering::Relaxed);

        // A failed refresh never erases the previous entry
        if !force_refresh && self.config.serve_stale_on_error {
            if let Some(feed) = self.entries.read().get(fingerprint).map(|e| Arc::clone(&e.feed)) {
                self.stale_served.fetch_add(1, Ordering::Relaxed);
                warn!("Refresh of feed {} failed, serving stale copy: {}", url, error);
                return Ok(feed);
            }
        }

        Err(error)
    }

    fn fresh_entry(&self, fingerprint: &str) -> Option<Arc<ParsedFeed>> {
        self.entries
            .read()
            .get(fingerprint)
            .filter(|entry| entry.is_fresh(self.config.ttl))
            .map(|entry| Arc::clone(&entry.feed))
    }

    /// Entry usable by a caller that queued at `requested_at`: anything
    /// fetched after the call started, or any fresh entry unless forced
    fn reusable_entry(
        &self,
        fingerprint: &str,
        force_refresh: bool,
        requested_at: Instant,
    ) -> Option<Arc<ParsedFeed>> {
        self.entries
            .read()
            .get(fingerprint)
            .filter(|entry| {
                entry.fetched_at > requested_at
                    || (!force_refresh && entry.is_fresh(self.config.ttl))
            })
            .map(|entry| Arc::clone(&entry.feed))
    }

    fn flight_lock(&self, fingerprint: &str) -> Arc<AsyncMutex<()>> {
        let mut in_flight = self.in_flight.lock();
        Arc::clone(
            in_flight
                .entry(fingerprint.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    fn release_flight(&self, fingerprint: &str, flight: Arc<AsyncMutex<()>>) {
        let mut in_flight = self.in_flight.lock();
        // Only the map and this handle left: nobody is queued
        if Arc::strong_count(&flight) <= 2 {
            in_flight.remove(fingerprint);
        }
    }

    fn store(&self, fingerprint: &str, feed: Arc<ParsedFeed>) {
        let mut entries = self.entries.write();
        let max_entries = self.config.max_entries.max(1);

        if !entries.contains_key(fingerprint) && entries.len() >= max_entries {
            let ttl = self.config.ttl;
            entries.retain(|_, entry| entry.is_fresh(ttl));

            if entries.len() >= max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.fetched_at)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                    debug!("Evicted oldest cached feed {}", oldest);
                }
            }
        }

        entries.insert(
            fingerprint.to_string(),
            CacheEntry {
                fetched_at: Instant::now(),
                feed,
            },
        );
    }

    /// How long an entry is kept before the sweeper drops it
    ///
    /// With stale serving on, expired entries are kept for another TTL so
    /// a failed refresh still has something to fall back to.
    fn retention(&self) -> Duration {
        if self.config.serve_stale_on_error {
            self.config.ttl.saturating_mul(2)
        } else {
            self.config.ttl
        }
    }

    /// Drop entries past their retention, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let retention = self.retention();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(retention));
        before - entries.len()
    }

    /// Periodically sweep expired entries until the cache is dropped
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let removed = cache.sweep_expired();
                if removed > 0 {
                    info!("Swept {} expired feeds from cache", removed);
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
        }
    }
}
