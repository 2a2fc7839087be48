//! Server configuration from environment variables

use std::env;
use std::time::Duration;

use url::Url;

use channel_feed::UrlPolicy;
use channel_services::{ChannelConfig, FeedCacheConfig};

const DEFAULT_FEED_URL: &str = "https://feeds.npr.org/500005/podcast.xml";

/// Configuration for the channel server
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Feed shown when the caller does not pick one
    pub default_feed_url: String,
    /// Whether `?rss=` is honored
    pub allow_feed_query: bool,
    /// Domain suffixes caller feed URLs must match (empty: any public host)
    pub allowlist: Vec<String>,
    pub episode_limit: usize,
    /// Zero disables caching
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub fetch_timeout: Duration,
    /// Description budget for the HTML page
    pub page_description_chars: usize,
    /// Description budget for the JSON API
    pub api_description_chars: usize,
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Reads FEED_URL, ALLOW_FEED_QUERY, FEED_ALLOWLIST, EPISODE_LIMIT,
    /// CACHE_TTL_MS, CACHE_MAX_ENTRIES, FETCH_TIMEOUT_SECS,
    /// PAGE_DESCRIPTION_CHARS, API_DESCRIPTION_CHARS and SERVER_PORT.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let default_feed_url = match var("FEED_URL") {
            Some(url) => canonical_feed_url(&url)?,
            None => DEFAULT_FEED_URL.to_string(),
        };

        let allowlist = var("FEED_ALLOWLIST")
            .map(|list| {
                list.split(',')
                    .map(|entry| entry.trim().to_string())
                    .filter(|entry| !entry.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            default_feed_url,
            allow_feed_query: parse_bool("ALLOW_FEED_QUERY", var("ALLOW_FEED_QUERY"), true)?,
            allowlist,
            episode_limit: parse_positive("EPISODE_LIMIT", var("EPISODE_LIMIT"), 100)?,
            cache_ttl: Duration::from_millis(parse_number(
                "CACHE_TTL_MS",
                var("CACHE_TTL_MS"),
                300_000,
            )?),
            cache_max_entries: parse_positive("CACHE_MAX_ENTRIES", var("CACHE_MAX_ENTRIES"), 256)?,
            fetch_timeout: Duration::from_secs(parse_positive(
                "FETCH_TIMEOUT_SECS",
                var("FETCH_TIMEOUT_SECS"),
                15,
            )?),
            page_description_chars: parse_positive(
                "PAGE_DESCRIPTION_CHARS",
                var("PAGE_DESCRIPTION_CHARS"),
                180,
            )?,
            api_description_chars: parse_positive(
                "API_DESCRIPTION_CHARS",
                var("API_DESCRIPTION_CHARS"),
                1000,
            )?,
            port: parse_number("SERVER_PORT", var("SERVER_PORT"), 3000)?,
        })
    }

    pub fn url_policy(&self) -> UrlPolicy {
        UrlPolicy::new(&self.allowlist)
    }

    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            default_feed_url: self.default_feed_url.clone(),
            allow_feed_query: self.allow_feed_query,
            url_policy: self.url_policy(),
            episode_limit: self.episode_limit,
        }
    }

    pub fn cache_config(&self) -> FeedCacheConfig {
        FeedCacheConfig {
            ttl: self.cache_ttl,
            max_entries: self.cache_max_entries,
            fetch_timeout: self.fetch_timeout,
            ..FeedCacheConfig::default()
        }
    }

    /// How often expired feeds are swept from the cache
    pub fn sweep_interval(&self) -> Duration {
        self.cache_ttl.max(Duration::from_secs(60))
    }
}

/// The operator's feed is trusted, it only has to be a well-formed http(s) URL
fn canonical_feed_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidFeedUrl(raw.to_string());

    let url = Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
        return Err(invalid());
    }

    Ok(url.into())
}

fn parse_bool(name: &str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };

    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name: name.to_string(),
            value,
            expected: "a boolean",
        }),
    }
}

fn parse_number<T>(name: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match value {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name: name.to_string(),
            value,
            expected: "a non-negative integer",
        }),
    }
}

fn parse_positive<T>(name: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let parsed = parse_number(name, value.clone(), default)?;
    if parsed <= T::default() {
        return Err(ConfigError::Invalid {
            name: name.to_string(),
            value: value.unwrap_or_default(),
            expected: "a positive integer",
        });
    }
    Ok(parsed)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {name}: expected {expected}")]
    Invalid {
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error("FEED_URL must be an absolute http(s) URL, got {0:?}")]
    InvalidFeedUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.default_feed_url, DEFAULT_FEED_URL);
        assert!(config.allow_feed_query);
        assert!(config.allowlist.is_empty());
        assert_eq!(config.episode_limit, 100);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.fetch_timeout, Duration::from_secs(15));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("FEED_URL", "https://Podcasts.Example.com/feed.xml"),
            ("ALLOW_FEED_QUERY", "off"),
            ("FEED_ALLOWLIST", "example.com, feeds.npr.org ,,"),
            ("EPISODE_LIMIT", "25"),
            ("CACHE_TTL_MS", "0"),
            ("SERVER_PORT", "8080"),
        ])
        .unwrap();

        assert_eq!(config.default_feed_url, "https://podcasts.example.com/feed.xml");
        assert!(!config.allow_feed_query);
        assert_eq!(config.allowlist, vec!["example.com", "feeds.npr.org"]);
        assert_eq!(config.episode_limit, 25);
        assert_eq!(config.cache_ttl, Duration::ZERO);
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.port, 8080);

        let channel = config.channel_config();
        assert!(channel.url_policy.validate("https://a.example.com/rss").is_ok());
        assert!(channel.url_policy.validate("https://other.org/rss").is_err());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            load(&[("EPISODE_LIMIT", "0")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            load(&[("CACHE_TTL_MS", "-5")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            load(&[("ALLOW_FEED_QUERY", "maybe")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            load(&[("FEED_URL", "ftp://example.com/feed")]),
            Err(ConfigError::InvalidFeedUrl(_))
        ));
    }
}
