//! Feed URL policy
//!
//! Caller-supplied feed URLs are checked before anything is fetched:
//! scheme, local hostnames, literal private/reserved IP addresses and an
//! optional domain-suffix allowlist. Hostnames are never resolved, so a
//! public name pointing at a private address is not caught here.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;
use url::{Host, Url};

/// Why a feed URL was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlRejection {
    #[error("invalid URL")]
    Invalid,

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("local hostnames are not allowed")]
    LocalHostname,

    #[error("private or reserved IP addresses are not allowed")]
    PrivateAddress,

    #[error("host is not in the feed allowlist")]
    NotAllowlisted,
}

/// A feed URL that passed the policy, in canonical form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedUrl(String);

impl FeedUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Which feed URLs may be fetched on behalf of a caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlPolicy {
    /// Lower-cased domain suffixes; empty means any public host
    allowlist: Vec<String>,
}

impl UrlPolicy {
    /// Build a policy from allowlist entries such as `example.com` or `.example.com`
    pub fn new<I, S>(allowlist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowlist = allowlist
            .into_iter()
            .map(|entry| {
                entry
                    .as_ref()
                    .trim()
                    .trim_start_matches('.')
                    .trim_end_matches('.')
                    .to_ascii_lowercase()
            })
            .filter(|entry| !entry.is_empty())
            .collect();

        Self { allowlist }
    }

    pub fn allowlist(&self) -> &[String] {
        &self.allowlist
    }

    /// Check `raw` and return its canonical serialization
    pub fn validate(&self, raw: &str) -> Result<FeedUrl, UrlRejection> {
        let mut url = Url::parse(raw.trim()).map_err(|_| UrlRejection::Invalid)?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(UrlRejection::UnsupportedScheme(other.to_string())),
        }

        let hostname = match url.host() {
            Some(Host::Domain(domain)) => {
                let domain = domain.trim_end_matches('.').to_ascii_lowercase();
                if is_local_hostname(&domain) {
                    return Err(UrlRejection::LocalHostname);
                }
                domain
            }
            Some(Host::Ipv4(ip)) => {
                if is_blocked_ip(IpAddr::V4(ip)) {
                    return Err(UrlRejection::PrivateAddress);
                }
                ip.to_string()
            }
            Some(Host::Ipv6(ip)) => {
                if is_blocked_ip(IpAddr::V6(ip)) {
                    return Err(UrlRejection::PrivateAddress);
                }
                ip.to_string()
            }
            None => return Err(UrlRejection::MissingHost),
        };

        if !self.is_allowlisted(&hostname) {
            return Err(UrlRejection::NotAllowlisted);
        }

        url.set_fragment(None);
        Ok(FeedUrl(url.into()))
    }

    /// Suffix match on label boundaries: `example.com` admits `a.example.com`
    /// but not `evilexample.com`
    fn is_allowlisted(&self, hostname: &str) -> bool {
        if self.allowlist.is_empty() {
            return true;
        }

        self.allowlist.iter().any(|entry| {
            hostname == entry
                || hostname
                    .strip_suffix(entry.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

fn is_local_hostname(hostname: &str) -> bool {
    hostname == "localhost" || hostname.ends_with(".localhost") || hostname.ends_with(".local")
}

/// Literal addresses that must never be fetched
fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_ipv4(v4),
        IpAddr::V6(v6) => is_blocked_ipv6(v6),
    }
}

fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();

    a == 0 // 0.0.0.0/8
        || a == 10 // 10.0.0.0/8
        || a == 127 // 127.0.0.0/8
        || (a == 100 && (64..=127).contains(&b)) // 100.64.0.0/10
        || (a == 169 && b == 254) // 169.254.0.0/16
        || (a == 172 && (16..=31).contains(&b)) // 172.16.0.0/12
        || (a == 192 && b == 168) // 192.168.0.0/16
}

fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_blocked_ipv4(mapped);
    }

    let first = ip.segments()[0];

    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xffc0) == 0xfe80 // fe80::/10
        || (first & 0xfe00) == 0xfc00 // fc00::/7
}
