//! Feed client
//!
//! Fetches RSS/Atom documents and parses them into [`ParsedFeed`], keeping
//! the podcast extensions (iTunes, Media RSS) the episode normalizer needs.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use reqwest::{redirect, Client};
use tracing::{debug, warn};

use channel_core::{ItunesImage, ParsedFeed, RawItem, RawMedia};

use crate::error::FeedError;
use crate::url_policy::UrlPolicy;

const USER_AGENT: &str = "FeedChannel/1.0";

/// Upper bound on redirect hops for a single feed request
const MAX_REDIRECTS: usize = 5;

/// HTTP client for feed documents
pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    /// Create a client with a request timeout
    ///
    /// Every redirect target is checked against `policy`, so a public feed
    /// URL cannot bounce the request onto a local or private address.
    pub fn new(timeout: Duration, policy: UrlPolicy) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(redirect_policy(policy))
            .build()
            .map_err(|e| FeedError::InvalidConfig(e.to_string()))?;

        Ok(Self { client })
    }

    /// Fetch and parse a single feed
    pub async fn fetch_feed(&self, url: &str) -> Result<ParsedFeed, FeedError> {
        debug!("Fetching feed {}", url);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FeedError::ApiError {
                status: response.status().as_u16(),
                message: format!("Failed to fetch {}", url),
            });
        }

        let content = response.bytes().await?;
        let feed = parse_feed(&content)?;

        debug!("Parsed {} items from {}", feed.items.len(), url);
        Ok(feed)
    }
}

fn redirect_policy(policy: UrlPolicy) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }

        let target = attempt.url().to_string();
        match policy.validate(&target) {
            Ok(_) => attempt.follow(),
            Err(rejection) => {
                warn!("Refusing feed redirect to {}: {}", target, rejection);
                attempt.error(rejection)
            }
        }
    })
}

/// Parse a feed document, trying RSS first and then Atom
pub fn parse_feed(content: &[u8]) -> Result<ParsedFeed, FeedError> {
    if let Ok(channel) = rss::Channel::read_from(content) {
        return Ok(parse_rss_channel(&channel));
    }

    if let Ok(atom_feed) = atom_syndication::Feed::read_from(content) {
        return Ok(parse_atom_feed(&atom_feed));
    }

    Err(FeedError::ParseError(
        "document is neither RSS nor Atom".to_string(),
    ))
}

fn parse_rss_channel(channel: &rss::Channel) -> ParsedFeed {
    ParsedFeed {
        title: non_empty(channel.title()),
        link: non_empty(channel.link()),
        description: non_empty(channel.description()),
        items: channel.items().iter().map(parse_rss_item).collect(),
    }
}

fn parse_rss_item(item: &rss::Item) -> RawItem {
    let itunes = item.itunes_ext();
    let media = item.extensions().get("media");

    let pub_date = item
        .pub_date()
        .and_then(non_empty)
        .or_else(|| {
            item.dublin_core_ext()
                .and_then(|dc| dc.dates().first())
                .and_then(|d| non_empty(d))
        });
    let iso_date = pub_date.as_deref().and_then(iso_timestamp);

    let description = item
        .description()
        .and_then(non_empty)
        .or_else(|| itunes.and_then(|ext| ext.summary()).and_then(non_empty));

    let enclosure = item
        .enclosure()
        .filter(|e| !e.url().trim().is_empty())
        .map(|e| RawMedia::new(e.url().trim(), e.mime_type().trim()));

    let itunes_image = itunes
        .and_then(|ext| ext.image())
        .and_then(non_empty)
        .map(|href| ItunesImage::Structured {
            href: Some(href),
            url: None,
        })
        .or_else(|| raw_itunes_image(item));

    let itunes_duration = itunes.and_then(|ext| ext.duration()).and_then(non_empty);

    RawItem {
        title: item.title().and_then(non_empty),
        link: item.link().and_then(non_empty),
        pub_date,
        iso_date,
        description,
        content: item.content().and_then(non_empty),
        enclosure,
        media_contents: media.map(media_contents).unwrap_or_default(),
        media_thumbnail: media.and_then(media_thumbnail),
        itunes_image,
        itunes_duration,
    }
}

type RssExtensions = BTreeMap<String, Vec<rss::extension::Extension>>;

/// `media:content` entries, including those nested in `media:group`
fn media_contents(media: &RssExtensions) -> Vec<RawMedia> {
    media_elements(media, "content", rss::extension::Extension::children)
        .filter_map(|content| {
            let attrs = content.attrs();
            let url = attrs.get("url").map(|u| u.trim()).filter(|u| !u.is_empty())?;
            let mime_type = attrs.get("type").map(|t| t.trim()).unwrap_or_default();

            // Artwork published as media:content is not playable
            let is_image = attrs.get("medium").map(String::as_str) == Some("image")
                || mime_type.starts_with("image/");
            if is_image {
                return None;
            }

            Some(RawMedia::new(url, mime_type))
        })
        .collect()
}

fn media_thumbnail(media: &RssExtensions) -> Option<String> {
    thumbnail_url(
        media,
        rss::extension::Extension::children,
        rss::extension::Extension::attrs,
    )
}

/// `media:<name>` elements at the top level and inside `media:group`
///
/// Generic over the element type since rss and atom_syndication each
/// define their own extension struct with the same shape.
fn media_elements<'a, E>(
    media: &'a BTreeMap<String, Vec<E>>,
    name: &'a str,
    children: fn(&E) -> &BTreeMap<String, Vec<E>>,
) -> impl Iterator<Item = &'a E> {
    let top_level = media.get(name).into_iter().flatten();
    let grouped = media
        .get("group")
        .into_iter()
        .flatten()
        .flat_map(move |group| children(group).get(name).into_iter().flatten());

    top_level.chain(grouped)
}

/// First non-empty `url` of a `media:thumbnail`
fn thumbnail_url<E>(
    media: &BTreeMap<String, Vec<E>>,
    children: fn(&E) -> &BTreeMap<String, Vec<E>>,
    attrs: fn(&E) -> &BTreeMap<String, String>,
) -> Option<String> {
    media_elements(media, "thumbnail", children)
        .find_map(|thumbnail| attrs(thumbnail).get("url").and_then(|u| non_empty(u)))
}

/// `itunes:image` left in the raw extension map (undeclared namespace)
fn raw_itunes_image(item: &rss::Item) -> Option<ItunesImage> {
    let image = item.extensions().get("itunes")?.get("image")?.first()?;
    let attrs = image.attrs();

    let href = attrs.get("href").and_then(|h| non_empty(h));
    let url = attrs.get("url").and_then(|u| non_empty(u));
    if href.is_some() || url.is_some() {
        return Some(ItunesImage::Structured { href, url });
    }

    image.value().and_then(non_empty).map(ItunesImage::Plain)
}

fn parse_atom_feed(feed: &atom_syndication::Feed) -> ParsedFeed {
    ParsedFeed {
        title: non_empty(feed.title().as_str()),
        link: alternate_link(feed.links()),
        description: feed.subtitle().and_then(|s| non_empty(s.as_str())),
        items: feed.entries().iter().map(parse_atom_entry).collect(),
    }
}

fn parse_atom_entry(entry: &atom_syndication::Entry) -> RawItem {
    let date = entry.published().unwrap_or_else(|| entry.updated());

    let enclosure = entry
        .links()
        .iter()
        .find(|l| l.rel() == "enclosure" && !l.href().trim().is_empty())
        .map(|l| RawMedia::new(l.href().trim(), l.mime_type().unwrap_or_default().trim()));

    let media_thumbnail = entry.extensions().get("media").and_then(|media| {
        thumbnail_url(
            media,
            atom_syndication::extension::Extension::children,
            atom_syndication::extension::Extension::attrs,
        )
    });

    RawItem {
        title: non_empty(entry.title().as_str()),
        link: alternate_link(entry.links()),
        pub_date: Some(date.to_rfc3339()),
        iso_date: Some(utc_timestamp(date)),
        description: entry.summary().and_then(|s| non_empty(s.as_str())),
        content: entry.content().and_then(|c| c.value()).and_then(non_empty),
        enclosure,
        media_contents: Vec::new(),
        media_thumbnail,
        itunes_image: None,
        itunes_duration: None,
    }
}

/// The `alternate` link, or the first link that is not an enclosure
fn alternate_link(links: &[atom_syndication::Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel() == "alternate")
        .or_else(|| links.iter().find(|l| l.rel() != "enclosure"))
        .and_then(|l| non_empty(l.href()))
}

/// RFC 2822 (RSS) or RFC 3339 dates as a UTC RFC 3339 timestamp
fn iso_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|d| utc_timestamp(&d))
}

fn utc_timestamp(date: &DateTime<FixedOffset>) -> String {
    date.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PODCAST_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
     xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"
     xmlns:media="http://search.yahoo.com/mrss/"
     xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Late Night Radio</title>
    <link>https://radio.example.com</link>
    <description>Talk after dark</description>
    <item>
      <title>Episode Two</title>
      <link>https://radio.example.com/2</link>
      <pubDate>Tue, 02 Jan 2024 10:30:00 +0100</pubDate>
      <description><![CDATA[<p>Second <b>show</b></p>]]></description>
      <enclosure url="http://cdn.example.com/2.mp3" length="100" type="audio/mpeg"/>
      <itunes:image href="https://img.example.com/2.jpg"/>
      <itunes:duration>3725</itunes:duration>
    </item>
    <item>
      <title>Trailer</title>
      <pubDate>sometime last week</pubDate>
      <media:content url="https://cdn.example.com/cover.jpg" medium="image"/>
      <media:content url="https://cdn.example.com/trailer.mp4" type="video/mp4"/>
      <media:thumbnail url="https://img.example.com/trailer.jpg"/>
      <content:encoded><![CDATA[<p>Full notes</p>]]></content:encoded>
    </item>
  </channel>
</rss>"#;

    const VIDEO_ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
  <title>Clip Channel</title>
  <subtitle>Short clips</subtitle>
  <link rel="alternate" href="https://clips.example.com/"/>
  <id>urn:uuid:clips</id>
  <updated>2024-03-01T12:00:00Z</updated>
  <entry>
    <title>First clip</title>
    <id>urn:uuid:clip-1</id>
    <updated>2024-03-01T12:00:00Z</updated>
    <published>2024-02-29T08:00:00-05:00</published>
    <link rel="alternate" href="https://clips.example.com/1"/>
    <link rel="enclosure" type="video/webm" href="https://cdn.example.com/1.webm"/>
    <summary>A first clip</summary>
    <media:group>
      <media:thumbnail url="https://img.example.com/1.jpg"/>
    </media:group>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_podcast() {
        let feed = parse_feed(PODCAST_RSS.as_bytes()).unwrap();

        assert_eq!(feed.title.as_deref(), Some("Late Night Radio"));
        assert_eq!(feed.link.as_deref(), Some("https://radio.example.com"));
        assert_eq!(feed.items.len(), 2);

        let first = &feed.items[0];
        assert_eq!(first.title.as_deref(), Some("Episode Two"));
        assert_eq!(first.iso_date.as_deref(), Some("2024-01-02T09:30:00Z"));
        assert_eq!(
            first.enclosure,
            Some(RawMedia::new("http://cdn.example.com/2.mp3", "audio/mpeg"))
        );
        assert_eq!(
            first.itunes_image.as_ref().and_then(|i| i.location()),
            Some("https://img.example.com/2.jpg")
        );
        assert_eq!(first.itunes_duration.as_deref(), Some("3725"));
        assert_eq!(first.description.as_deref(), Some("<p>Second <b>show</b></p>"));
    }

    #[test]
    fn test_parse_rss_media_extensions() {
        let feed = parse_feed(PODCAST_RSS.as_bytes()).unwrap();
        let trailer = &feed.items[1];

        assert_eq!(trailer.enclosure, None);
        assert_eq!(
            trailer.media_contents,
            vec![RawMedia::new("https://cdn.example.com/trailer.mp4", "video/mp4")]
        );
        assert_eq!(
            trailer.media_thumbnail.as_deref(),
            Some("https://img.example.com/trailer.jpg")
        );
        assert_eq!(trailer.pub_date.as_deref(), Some("sometime last week"));
        assert_eq!(trailer.iso_date, None);
        assert_eq!(trailer.content.as_deref(), Some("<p>Full notes</p>"));
    }

    #[test]
    fn test_parse_atom_feed() {
        let feed = parse_feed(VIDEO_ATOM.as_bytes()).unwrap();

        assert_eq!(feed.title.as_deref(), Some("Clip Channel"));
        assert_eq!(feed.description.as_deref(), Some("Short clips"));
        assert_eq!(feed.link.as_deref(), Some("https://clips.example.com/"));

        let entry = &feed.items[0];
        assert_eq!(entry.link.as_deref(), Some("https://clips.example.com/1"));
        assert_eq!(entry.iso_date.as_deref(), Some("2024-02-29T13:00:00Z"));
        assert_eq!(
            entry.enclosure,
            Some(RawMedia::new("https://cdn.example.com/1.webm", "video/webm"))
        );
        assert_eq!(
            entry.media_thumbnail.as_deref(),
            Some("https://img.example.com/1.jpg")
        );
    }

    #[test]
    fn test_parse_rejects_non_feed() {
        let err = parse_feed(b"<html><body>not a feed</body></html>").unwrap_err();
        assert!(matches!(err, FeedError::ParseError(_)));
    }

    #[test]
    fn test_iso_timestamp() {
        assert_eq!(
            iso_timestamp("Mon, 01 Jan 2024 00:00:00 GMT").as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert_eq!(
            iso_timestamp("2024-01-01T02:00:00+02:00").as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert_eq!(iso_timestamp("yesterday"), None);
    }

    #[test]
    fn test_client_builds() {
        assert!(FeedClient::new(Duration::from_secs(5), UrlPolicy::default()).is_ok());
    }
}
