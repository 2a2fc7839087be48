//! Feed access for the channel
//!
//! This crate provides:
//! - URL policy: decides whether a caller-supplied feed URL may be fetched
//! - Feed client: fetches and parses RSS/Atom feeds into [`ParsedFeed`]
//! - Episode normalizer: turns raw feed items into playable episodes
//!
//! [`ParsedFeed`]: channel_core::ParsedFeed

pub mod episodes;
pub mod error;
pub mod feed_client;
pub mod source;
pub mod url_policy;

pub use episodes::{normalize, NormalizeOptions};
pub use error::FeedError;
pub use feed_client::{parse_feed, FeedClient};
pub use source::FeedSource;
pub use url_policy::{FeedUrl, UrlPolicy, UrlRejection};
