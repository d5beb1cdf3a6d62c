//! SteamGridDB artwork lookup
//!
//! Failures never reach the caller: a missing key, a network error or an
//! unexpected payload all produce an empty list and a warning.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use std::error::Error;
use std::time::Duration;

use crate::logging::{log_debug, log_warning};

pub const STEAMGRIDDB_API: &str = "https://www.steamgriddb.com/api/v2";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GameMatch {
    pub id: u64,
    pub name: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IconInfo {
    pub url: String,
    #[serde(default)]
    pub thumb: Option<String>,
    /// Image style as reported by the service
    #[serde(default)]
    pub style: Option<String>,
}

impl IconInfo {
    pub fn name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}

/// API response envelope
#[derive(Deserialize, Debug)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

pub trait ArtworkSource {
    fn search(&self, title: &str) -> Vec<GameMatch>;
    fn icons_for(&self, id: u64) -> Vec<IconInfo>;
}

pub struct SteamGridDb {
    api_key: String,
    base_url: String,
    agent: ureq::Agent,
}

impl SteamGridDb {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, STEAMGRIDDB_API)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
        }
    }

    fn fetch<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>, Box<dyn Error>> {
        let url = format!("{}/{}", self.base_url, endpoint);
        log_debug(&format!("GET {}", url));

        let response = self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("User-Agent", concat!("umu-launcher/", env!("CARGO_PKG_VERSION")))
            .call()?;
        let envelope: Envelope<T> = response.into_json()?;

        if !envelope.success {
            return Err(format!("{} reported failure", endpoint).into());
        }
        Ok(envelope.data)
    }

    fn fetch_or_empty<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Vec<T> {
        if self.api_key.trim().is_empty() {
            log_warning("No artwork API key configured");
            return Vec::new();
        }

        self.fetch(endpoint).unwrap_or_else(|e| {
            log_warning(&format!("Artwork lookup failed: {}", e));
            Vec::new()
        })
    }
}

impl ArtworkSource for SteamGridDb {
    fn search(&self, title: &str) -> Vec<GameMatch> {
        let title = title.trim();
        if title.is_empty() {
            return Vec::new();
        }
        self.fetch_or_empty(&format!("search/autocomplete/{}", encode_segment(title)))
    }

    fn icons_for(&self, id: u64) -> Vec<IconInfo> {
        self.fetch_or_empty(&format!("icons/game/{}", id))
    }
}

/// Everything outside the RFC 3986 unreserved set
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a single URL path segment.
fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, PATH_SEGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("Half-Life 2"), "Half-Life%202");
        assert_eq!(encode_segment("a/b?c"), "a%2Fb%3Fc");
        assert_eq!(encode_segment("Ōkami"), "%C5%8Ckami");
    }

    #[test]
    fn test_envelope_decoding() {
        let json = r#"{"success":true,"data":[{"id":5,"name":"Foo","types":["steam"]}]}"#;
        let envelope: Envelope<GameMatch> = serde_json::from_str(json).unwrap();
        assert!(envelope.success);
        assert_eq!(
            envelope.data,
            vec![GameMatch {
                id: 5,
                name: "Foo".to_string()
            }]
        );

        let json = r#"{"success":false,"errors":["bad key"]}"#;
        let envelope: Envelope<IconInfo> = serde_json::from_str(json).unwrap();
        assert!(!envelope.success);
        assert!(envelope.data.is_empty());
    }

    #[test]
    fn test_icon_name_from_url() {
        let icon = IconInfo {
            url: "https://cdn2.steamgriddb.com/icon/abc.png".to_string(),
            thumb: None,
            style: None,
        };
        assert_eq!(icon.name(), "abc.png");
    }

    #[test]
    fn test_missing_key_degrades_to_empty() {
        let client = SteamGridDb::with_base_url("", "http://127.0.0.1:9");
        assert!(client.search("Foo").is_empty());
        assert!(client.icons_for(1).is_empty());
    }

    #[test]
    fn test_unreachable_service_degrades_to_empty() {
        let client = SteamGridDb::with_base_url("key", "http://127.0.0.1:9/api/v2/");
        assert!(client.search("Foo").is_empty());
        assert!(client.icons_for(1).is_empty());
    }
}
