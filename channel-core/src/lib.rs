//! Core types for the feed channel
//!
//! This crate defines the shared data structures used across the channel,
//! from the loosely-typed feed shape produced by the parser to the strict
//! episode records handed to the renderers.

pub mod episode;
pub mod feed;

pub use episode::{EpisodeRecord, EpisodesResponse, FeedInfo, MediaKind};
pub use feed::{ItunesImage, ParsedFeed, RawItem, RawMedia};
