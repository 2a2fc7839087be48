//! Business logic services for the feed channel
//!
//! This crate provides the in-memory feed cache and the channel service
//! that runs a request through validation, caching and normalization.

pub mod channel_service;
pub mod error;
pub mod feed_cache;

pub use channel_service::{ChannelConfig, ChannelService};
pub use error::ChannelError;
pub use feed_cache::{CacheStats, FeedCache, FeedCacheConfig, FeedCacheError};
