//! HTML rendering for the channel page
//!
//! Markup is built with maud, so feed-supplied text is escaped on output.
//! The episode list is also embedded as JSON for the player script.

use axum::http::StatusCode;
use chrono::DateTime;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use url::Url;

use channel_core::{EpisodeRecord, EpisodesResponse, MediaKind};

const STYLES: &str = r#"
:root { color-scheme: dark; }
* { box-sizing: border-box; }
body { margin: 0; font-family: system-ui, sans-serif; background: #0b0d12; color: #e7e9ee; }
header { padding: 1rem 1.5rem; border-bottom: 1px solid #222834; display: flex; gap: 1rem; align-items: baseline; flex-wrap: wrap; }
header h1 { margin: 0; font-size: 1.4rem; }
header h1 a { color: inherit; text-decoration: none; }
header p { margin: 0; color: #9aa3b2; flex: 1 1 20rem; }
.feed-form { display: flex; gap: .5rem; }
.feed-form input { width: 22rem; max-width: 60vw; padding: .4rem .6rem; background: #151923; color: inherit; border: 1px solid #2c3444; border-radius: 4px; }
.feed-form button { padding: .4rem .8rem; background: #2d6cdf; color: #fff; border: 0; border-radius: 4px; cursor: pointer; }
main { display: grid; grid-template-columns: minmax(0, 2fr) minmax(18rem, 1fr); gap: 1.5rem; padding: 1.5rem; }
#screen { aspect-ratio: 16 / 9; background: #000; display: flex; align-items: center; justify-content: center; border-radius: 6px; overflow: hidden; }
#screen video { width: 100%; height: 100%; }
#screen img { max-height: 70%; max-width: 70%; }
#screen audio { position: absolute; bottom: 1rem; width: 60%; }
.player { position: relative; }
#now-playing { margin: .75rem 0 0; font-size: 1.1rem; }
.hint { color: #6b7486; font-size: .85rem; }
#guide { list-style: none; margin: 0; padding: 0; max-height: 80vh; overflow-y: auto; }
#guide li { padding: .6rem .75rem; border-radius: 4px; cursor: pointer; border-left: 3px solid transparent; }
#guide li.selected { background: #1a2130; border-left-color: #2d6cdf; }
#guide .title { font-weight: 600; }
#guide .meta { color: #8a93a5; font-size: .8rem; display: flex; gap: .6rem; }
#guide .kind { text-transform: uppercase; letter-spacing: .05em; }
#guide .description { color: #b5bcc9; font-size: .85rem; margin: .25rem 0 0; }
.empty, .error { padding: 3rem 1.5rem; text-align: center; color: #9aa3b2; }
.error h2 { color: #ff7a7a; }
@media (max-width: 800px) { main { grid-template-columns: 1fr; } }
"#;

const PLAYER_SCRIPT: &str = r#"
(function () {
  var data = JSON.parse(document.getElementById('episodes-data').textContent);
  var items = Array.prototype.slice.call(document.querySelectorAll('#guide li'));
  var screen = document.getElementById('screen');
  var nowPlaying = document.getElementById('now-playing');
  var current = 0;

  function select(index) {
    if (!items.length) return;
    current = (index + items.length) % items.length;
    items.forEach(function (li, n) { li.classList.toggle('selected', n === current); });
    items[current].scrollIntoView({ block: 'nearest' });
  }

  function play(index) {
    select(index);
    var episode = data[current];
    if (!episode) return;
    screen.innerHTML = '';
    if (episode.kind === 'audio' && episode.imageUrl) {
      var art = document.createElement('img');
      art.src = episode.imageUrl;
      art.alt = '';
      screen.appendChild(art);
    }
    var media = document.createElement(episode.kind === 'video' ? 'video' : 'audio');
    media.controls = true;
    media.autoplay = true;
    media.src = episode.mediaUrl;
    media.addEventListener('ended', function () { play(current + 1); });
    screen.appendChild(media);
    nowPlaying.textContent = episode.title;
  }

  document.addEventListener('keydown', function (event) {
    if (event.target.tagName === 'INPUT') return;
    switch (event.key) {
      case 'ArrowDown': case 'j': select(current + 1); break;
      case 'ArrowUp': case 'k': select(current - 1); break;
      case 'Enter': case ' ': play(current); break;
      case 'n': play(current + 1); break;
      case 'p': play(current - 1); break;
      default: return;
    }
    event.preventDefault();
  });

  items.forEach(function (li, n) {
    li.addEventListener('click', function () { play(n); });
  });

  select(0);
})();
"#;

/// Render the channel page for a loaded feed
pub fn channel_page(response: &EpisodesResponse, allow_feed_query: bool) -> Markup {
    let feed = &response.feed;
    let title = if feed.title.is_empty() {
        "Feed Channel"
    } else {
        feed.title.as_str()
    };

    layout(
        title,
        html! {
            header {
                h1 {
                    @if let Some(href) = web_link(&feed.link) {
                        a href=(href) { (title) }
                    } @else {
                        (title)
                    }
                }
                @if !feed.description.is_empty() {
                    p { (feed.description) }
                }
                @if allow_feed_query {
                    (feed_form(&feed.rss_url))
                }
            }
            @if response.episodes.is_empty() {
                p.empty { "No playable episodes in this feed." }
            } @else {
                main {
                    section.player {
                        div id="screen" {}
                        h2 id="now-playing" { "Press Enter to play" }
                        p.hint { "↑/↓ or j/k to browse, Enter or Space to play, n/p to skip" }
                    }
                    ol id="guide" {
                        @for episode in &response.episodes {
                            (guide_entry(episode))
                        }
                    }
                }
                script id="episodes-data" type="application/json" {
                    (PreEscaped(episodes_json(&response.episodes)))
                }
                script { (PreEscaped(PLAYER_SCRIPT)) }
            }
        },
    )
}

/// Render the page shown when a feed could not be loaded
pub fn error_page(status: StatusCode, message: &str, allow_feed_query: bool) -> Markup {
    layout(
        "Feed Channel",
        html! {
            header {
                h1 { "Feed Channel" }
                @if allow_feed_query {
                    (feed_form(""))
                }
            }
            section.error {
                h2 { (status.as_u16()) " " (status.canonical_reason().unwrap_or("Error")) }
                p { (message) }
            }
        },
    )
}

fn layout(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                style { (PreEscaped(STYLES)) }
            }
            body { (body) }
        }
    }
}

fn feed_form(rss_url: &str) -> Markup {
    html! {
        form.feed-form method="get" action="/" {
            input type="url" name="rss" placeholder="RSS feed URL" value=(rss_url);
            button type="submit" { "Tune in" }
        }
    }
}

fn guide_entry(episode: &EpisodeRecord) -> Markup {
    html! {
        li data-index=(episode.id) {
            div.title { (episode.title) }
            div.meta {
                span.kind { (kind_label(episode.kind)) }
                @if let Some(date) = display_date(&episode.published_at) {
                    span { (date) }
                }
                @if !episode.duration_label.is_empty() {
                    span { (episode.duration_label) }
                }
            }
            @if !episode.description.is_empty() {
                p.description { (episode.description) }
            }
        }
    }
}

fn kind_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Audio => "Radio",
        MediaKind::Video => "TV",
    }
}

/// Feed-supplied link, only when it is an absolute http(s) URL
fn web_link(link: &str) -> Option<&str> {
    let link = link.trim();
    let url = Url::parse(link).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(link)
}

/// ISO timestamps are shown as a short date; anything else as-is
fn display_date(published_at: &str) -> Option<String> {
    let published_at = published_at.trim();
    if published_at.is_empty() {
        return None;
    }

    Some(
        DateTime::parse_from_rfc3339(published_at)
            .map(|date| date.format("%b %-d, %Y").to_string())
            .unwrap_or_else(|_| published_at.to_string()),
    )
}

/// Episodes as JSON that is safe inside a `<script>` element
fn episodes_json(episodes: &[EpisodeRecord]) -> String {
    serde_json::to_string(episodes)
        .unwrap_or_else(|_| "[]".to_string())
        .replace('<', "\\u003c")
}
