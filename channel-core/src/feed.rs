//! Parsed feed shape
//!
//! Feed dialects disagree on which fields exist and how they are typed, so
//! everything here is optional. The episode normalizer turns these records
//! into strict [`EpisodeRecord`](crate::EpisodeRecord)s right away.

use serde::{Deserialize, Serialize};

/// A fetched and parsed feed (RSS channel or Atom feed)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedFeed {
    /// Channel title
    pub title: Option<String>,
    /// Channel website link
    pub link: Option<String>,
    /// Channel description
    pub description: Option<String>,
    /// Items in the order the feed lists them
    pub items: Vec<RawItem>,
}

/// A media reference (enclosure or media:content)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMedia {
    pub url: String,
    /// MIME type as declared by the feed, may be empty
    pub mime_type: String,
}

impl RawMedia {
    pub fn new(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// `itunes:image` as it appears in the wild
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItunesImage {
    /// Element text, e.g. `<itunes:image>https://...</itunes:image>`
    Plain(String),
    /// Attribute form, e.g. `<itunes:image href="https://..."/>`
    Structured {
        href: Option<String>,
        url: Option<String>,
    },
}

impl ItunesImage {
    /// The image URL, preferring `href` over `url` for the structured form
    pub fn location(&self) -> Option<&str> {
        let value = match self {
            ItunesImage::Plain(value) => Some(value.as_str()),
            ItunesImage::Structured { href, url } => href
                .as_deref()
                .filter(|h| !h.trim().is_empty())
                .or(url.as_deref()),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

/// A single raw feed item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Date string exactly as the feed wrote it
    pub pub_date: Option<String>,
    /// RFC 3339 timestamp when the feed date was parseable
    pub iso_date: Option<String>,
    /// Description / summary markup
    pub description: Option<String>,
    /// Full content markup (`content:encoded`, Atom content)
    pub content: Option<String>,
    pub enclosure: Option<RawMedia>,
    /// `media:content` entries in document order
    pub media_contents: Vec<RawMedia>,
    pub media_thumbnail: Option<String>,
    pub itunes_image: Option<ItunesImage>,
    pub itunes_duration: Option<String>,
}
