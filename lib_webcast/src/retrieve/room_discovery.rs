//! # Room Discovery
//!
//! Resolves a public live page URL into the three values the connector needs:
//! the numeric room id embedded in the page, the `ttwid` session cookie set by
//! the response, and the page URL itself.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, SET_COOKIE};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::connections::ws_connector::{DEFAULT_USER_AGENT, SESSION_COOKIE_NAME};
use crate::core::errors::WebcastError;

// The room id appears inside an escaped JSON blob: roomId\":\"123\"
static ROOM_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"roomId\\":\\"(\d+)\\""#).expect("room id pattern is valid"));

/// The discovery result handed to the connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_id: String,
    /// Value of the `ttwid` cookie.
    pub session_cookie: String,
    /// The live page the room was resolved from.
    pub source_url: String,
}

/// Request settings for the page fetch.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Extra request headers, applied in order.
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
    /// Retries for transient failures (connect errors, 5xx, 429).
    pub max_retries: u32,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            headers: vec![
                (
                    "accept".to_string(),
                    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8".to_string(),
                ),
                ("user-agent".to_string(), DEFAULT_USER_AGENT.to_string()),
                ("cookie".to_string(), "__ac_nonce=0638733a400869171be51".to_string()),
            ],
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }
}

/// HTTP client for resolving live pages.
pub struct RoomDiscovery {
    inner: ClientWithMiddleware,
    headers: HeaderMap,
}

impl RoomDiscovery {
    /// Builds the client. Fails on an invalid header name/value.
    pub fn new(options: DiscoveryOptions) -> Result<Self, WebcastError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| WebcastError::Discovery(format!("invalid header name {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| WebcastError::Discovery(format!("invalid value for header {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(options.max_retries);
        let client = reqwest::Client::builder().timeout(options.timeout).build()?;
        let inner = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { inner, headers })
    }

    /// Fetches `live_url` and extracts the room id and session cookie.
    pub async fn discover(&self, live_url: &str) -> Result<RoomInfo, WebcastError> {
        let url = parse_live_url(live_url)?;
        log::info!("Resolving live room from {}", url);
        let response = self.inner.get(url).headers(self.headers.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebcastError::Discovery(format!("{} returned HTTP {}", live_url, status)));
        }

        let session_cookie = extract_cookie(response.headers(), SESSION_COOKIE_NAME).ok_or_else(|| {
            WebcastError::Discovery(format!("response did not set the {} cookie", SESSION_COOKIE_NAME))
        })?;
        let body = response.text().await?;
        let room_id = extract_room_id(&body)
            .ok_or_else(|| WebcastError::Discovery("no room id found in live page".to_string()))?;

        log::info!("Resolved room {} from {}", room_id, live_url);
        Ok(RoomInfo {
            room_id,
            session_cookie,
            source_url: live_url.to_string(),
        })
    }
}

/// Accepts only absolute `http`/`https` URLs.
pub fn parse_live_url(live_url: &str) -> Result<Url, WebcastError> {
    let url = Url::parse(live_url)
        .map_err(|e| WebcastError::Discovery(format!("invalid live url {:?}: {}", live_url, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(WebcastError::Discovery(format!("unsupported scheme {:?} in live url", other))),
    }
}

/// Finds the first embedded room id in a live page body.
pub fn extract_room_id(body: &str) -> Option<String> {
    ROOM_ID_PATTERN
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Returns the value of cookie `name` from the response's `Set-Cookie` headers.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
}
