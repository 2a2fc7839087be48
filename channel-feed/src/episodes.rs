//! Episode normalizer
//!
//! Maps raw feed items into [`EpisodeRecord`]s: picks the playable media,
//! infers audio vs. video, selects artwork, cleans the description and drops
//! anything that has nothing to play.

use std::sync::LazyLock;

use regex::Regex;

use channel_core::{EpisodeRecord, MediaKind, RawItem};

/// Appended to descriptions cut at the character budget
pub const ELLIPSIS: char = '…';

static VIDEO_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(m3u8|mp4|webm|mov)(?:[?#]|$)").expect("valid video extension pattern")
});

static AUDIO_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(mp3|m4a|aac|ogg|wav)(?:[?#]|$)").expect("valid audio extension pattern")
});

/// Knobs for a normalization pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Maximum number of feed items to consider
    pub limit: usize,
    /// Description budget in characters (before the ellipsis)
    pub description_chars: usize,
}

/// Normalize the first `limit` items into playable episodes
pub fn normalize(items: &[RawItem], options: NormalizeOptions) -> Vec<EpisodeRecord> {
    items
        .iter()
        .take(options.limit)
        .filter_map(|item| normalize_item(item, options.description_chars))
        .enumerate()
        .map(|(id, mut episode)| {
            episode.id = id;
            if episode.title.is_empty() {
                episode.title = format!("Episode {}", id + 1);
            }
            episode
        })
        .collect()
}

fn normalize_item(item: &RawItem, description_chars: usize) -> Option<EpisodeRecord> {
    let (media_url, media_type) = select_media(item);
    if media_url.is_empty() {
        return None;
    }

    let kind = infer_kind(&media_type, &media_url);

    let image_url = item
        .media_thumbnail
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .or_else(|| item.itunes_image.as_ref().and_then(|image| image.location()))
        .map(upgrade_to_https)
        .unwrap_or_default();

    let description = item
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .or(item.content.as_deref())
        .map(|html| clean_description(html, description_chars))
        .unwrap_or_default();

    let published_at = item
        .iso_date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .or(item.pub_date.as_deref())
        .unwrap_or_default()
        .to_string();

    Some(EpisodeRecord {
        id: 0,
        title: item.title.as_deref().map(str::trim).unwrap_or_default().to_string(),
        published_at,
        description,
        media_url: upgrade_to_https(&media_url),
        media_type,
        kind,
        image_url,
        duration_label: item
            .itunes_duration
            .as_deref()
            .map(duration_label)
            .unwrap_or_default(),
        link: item.link.as_deref().map(str::trim).unwrap_or_default().to_string(),
    })
}

/// Enclosure, else first media:content, else the item link with no type
fn select_media(item: &RawItem) -> (String, String) {
    let declared = item
        .enclosure
        .iter()
        .chain(item.media_contents.first())
        .find(|media| !media.url.trim().is_empty());

    match declared {
        Some(media) => (media.url.trim().to_string(), media.mime_type.trim().to_string()),
        None => (
            item.link.as_deref().map(str::trim).unwrap_or_default().to_string(),
            String::new(),
        ),
    }
}

/// Infer the player kind from the declared type, then the URL extension
pub fn infer_kind(media_type: &str, url: &str) -> MediaKind {
    let media_type = media_type.trim().to_ascii_lowercase();

    if media_type.starts_with("video/") {
        MediaKind::Video
    } else if media_type.starts_with("audio/") {
        MediaKind::Audio
    } else if VIDEO_EXTENSION.is_match(url) {
        MediaKind::Video
    } else if AUDIO_EXTENSION.is_match(url) {
        MediaKind::Audio
    } else {
        // Untyped feeds are overwhelmingly podcasts
        MediaKind::Audio
    }
}

/// Rewrite `http://` to `https://` so the page does not load mixed content
pub fn upgrade_to_https(url: &str) -> String {
    match url.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("http://") => format!("https://{}", &url[7..]),
        _ => url.to_string(),
    }
}

/// Strip markup, collapse whitespace and cut to `budget` characters
pub fn clean_description(html: &str, budget: usize) -> String {
    let text = strip_html(html);

    if text.chars().count() <= budget {
        return text;
    }

    let mut truncated: String = text.chars().take(budget).collect();
    truncated.push(ELLIPSIS);
    truncated
}

/// Strip HTML tags and decode entities into single-spaced plain text
///
/// Markup is stripped again after decoding, since double-encoded feeds
/// carry their tags as entities.
pub fn strip_html(html: &str) -> String {
    let decoded = html_escape::decode_html_entities(&strip_tags(html)).into_owned();

    strip_tags(&decoded)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove tags, leaving a space where a block element ended or began
///
/// A `<` only opens a tag when followed by a letter, `/` or `!`, so text
/// such as `a < b` survives.
fn strip_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut tag = String::new();
    let mut in_tag = false;
    let mut chars = html.chars().peekable();

    while let Some(c) = chars.next() {
        if in_tag {
            if c == '>' {
                in_tag = false;
                // Block elements separate words
                if is_block_tag(&tag) {
                    result.push(' ');
                }
            } else {
                tag.push(c);
            }
        } else if c == '<'
            && chars
                .peek()
                .is_some_and(|next| next.is_ascii_alphabetic() || matches!(next, '/' | '!'))
        {
            in_tag = true;
            tag.clear();
        } else {
            result.push(c);
        }
    }

    result
}

fn is_block_tag(tag: &str) -> bool {
    let name = tag
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    matches!(
        name.as_str(),
        "br" | "p" | "div" | "li" | "ul" | "ol" | "tr" | "td" | "blockquote"
            | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
    )
}

/// Human-readable duration from `itunes:duration`
///
/// A plain second count becomes `H:MM:SS` (or `M:SS` under an hour); clock
/// style values are already readable and pass through.
pub fn duration_label(raw: &str) -> String {
    let raw = raw.trim();

    match raw.parse::<u64>() {
        Ok(total) => {
            let hours = total / 3600;
            let minutes = (total % 3600) / 60;
            let seconds = total % 60;
            if hours > 0 {
                format!("{}:{:02}:{:02}", hours, minutes, seconds)
            } else {
                format!("{}:{:02}", minutes, seconds)
            }
        }
        Err(_) => raw.to_string(),
    }
}
