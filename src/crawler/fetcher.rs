//! Detail page fetcher with optional rate limiting and GBK fallback
//!
//! The detail endpoint is a plain GET keyed by area id and notice id. Pages
//! are normally UTF-8 but older ones are GBK, so decoding honours the
//! declared charset and otherwise falls back from UTF-8 to GBK.

use async_trait::async_trait;
use encoding_rs::{Encoding, GBK, UTF_8};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{header::HeaderMap, Client, Response};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::config::Config;
use crate::crawler::headers::build_browser_headers;
use crate::models::NoticeId;
use crate::utils::error::FetchError;

/// Action name the detail endpoint expects
pub const DETAIL_ACTION: &str = "noticedetailHTML";

/// Something that can produce the raw HTML of a notice detail page
///
/// The pipeline only depends on this seam, so tests can substitute a slow or
/// failing source without a network.
#[async_trait]
pub trait DetailSource: Send + Sync {
    /// Fetch the detail page for one notice
    async fn fetch_detail(&self, id: NoticeId) -> Result<String, FetchError>;
}

/// Build the shared HTTP client
pub(crate) fn build_client(timeout: Duration) -> Result<Client, FetchError> {
    Client::builder()
        .timeout(timeout)
        .gzip(true)
        .build()
        .map_err(FetchError::Http)
}

/// Notice detail fetcher
pub struct DetailFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Detail endpoint URL
    detail_url: String,

    /// Area/community identifier
    cell_id: String,

    /// Browser headers sent with every request
    headers: HeaderMap,

    /// Rate limiter, absent when unlimited
    rate_limiter: Option<DefaultDirectRateLimiter>,
}

impl DetailFetcher {
    /// Create a fetcher from configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created, or
    /// `FetchError::InvalidHeader` if the configured user agent is unusable
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let headers =
            build_browser_headers(&config.crawler.user_agent, &config.crawler.accept_language)?;

        Ok(Self {
            client: build_client(config.request_timeout())?,
            detail_url: config.source.detail_url.clone(),
            cell_id: config.source.cell_id.clone(),
            headers,
            rate_limiter: rate_limiter(config.crawler.requests_per_second),
        })
    }

    /// Endpoint this fetcher talks to
    pub fn detail_url(&self) -> &str {
        &self.detail_url
    }

    /// Whether requests are rate limited
    pub fn is_rate_limited(&self) -> bool {
        self.rate_limiter.is_some()
    }

    async fn get(&self, id: NoticeId) -> Result<String, FetchError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        tracing::debug!(id, url = %self.detail_url, "Fetching notice detail");

        let id = id.to_string();
        let response = self
            .client
            .get(&self.detail_url)
            .headers(self.headers.clone())
            .query(&[
                ("action", DETAIL_ACTION),
                ("cellId", self.cell_id.as_str()),
                ("id", id.as_str()),
            ])
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ServerError(status.as_u16()));
        }

        decode_response(response).await
    }
}

#[async_trait]
impl DetailSource for DetailFetcher {
    async fn fetch_detail(&self, id: NoticeId) -> Result<String, FetchError> {
        self.get(id).await
    }
}

/// Build a direct rate limiter, or none for 0
pub(crate) fn rate_limiter(requests_per_second: u32) -> Option<DefaultDirectRateLimiter> {
    NonZeroU32::new(requests_per_second).map(|rate| RateLimiter::direct(Quota::per_second(rate)))
}

async fn decode_response(response: Response) -> Result<String, FetchError> {
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_default();

    let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;

    tracing::trace!(bytes = bytes.len(), content_type = %content_type, "Decoding response body");

    Ok(decode_bytes(&bytes, &content_type))
}

/// Decode a response body to a string
///
/// Strategy:
/// 1. A charset declared in the Content-Type header wins
/// 2. Otherwise strict UTF-8
/// 3. Otherwise GBK, if it decodes cleanly
/// 4. Otherwise lossy UTF-8
///
/// Never fails: a page that decodes badly simply won't match the pattern.
pub fn decode_bytes(bytes: &[u8], content_type: &str) -> String {
    if let Some(encoding) = declared_charset(content_type) {
        let (cow, _encoding, _had_errors) = encoding.decode(bytes);
        return cow.into_owned();
    }

    let (cow, had_errors) = UTF_8.decode_without_bom_handling(bytes);
    if !had_errors {
        return cow.into_owned();
    }

    let (gbk, gbk_errors) = GBK.decode_without_bom_handling(bytes);
    if !gbk_errors {
        return gbk.into_owned();
    }

    cow.into_owned()
}

fn declared_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, label)| Encoding::for_label(label.trim().trim_matches('"').as_bytes()))
}
