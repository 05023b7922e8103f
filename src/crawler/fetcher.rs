//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - A shared keep-alive connection pool
//! - Default `User-Agent` injection, optionally rotated per request
//! - Default `Referer` derivation from the request URL
//! - Bounded retry of requests that time out in transport
//! - Treating every non-200 status as terminal

use crate::config::FetchConfig;
use crate::{CrawlError, Result};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::{Client, Method, Response, StatusCode};
use std::time::Duration;
use url::Url;

/// Shortest prefix a derived referer may keep, the length of `"https://"`
const MIN_REFERER_PREFIX: usize = 8;

/// Builds the pooled HTTP client shared by every request of a fetcher
pub fn build_http_client(config: &FetchConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_millis(config.request_timeout_ms))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .tcp_keepalive(Duration::from_secs(60))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Generates a plausible desktop browser identity with randomized build numbers
pub fn generate_identity<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "Mozilla/5.0 AppleWebKit/{}.{} (KHTML, like Gecko) Chrome/{}.1.{}.{} Safari/{}.{}",
        529 + rng.gen_range(0..10),
        80 + rng.gen_range(0..10),
        54 + rng.gen_range(0..10),
        2200 + rng.gen_range(0..100),
        40 + rng.gen_range(0..10),
        533 + rng.gen_range(0..10),
        35 + rng.gen_range(0..10),
    )
}

/// Derives a default referer by cutting `url` at its last path separator
///
/// A single trailing `/` is ignored first, so a collection URL refers back to
/// its parent. Returns `None` when the kept prefix would be shorter than a bare
/// scheme such as `"https://"`.
///
/// ```
/// use crawlee::crawler::default_referer;
///
/// assert_eq!(
///     default_referer("https://shop.example/api/v1/items/"),
///     Some("https://shop.example/api/v1")
/// );
/// assert_eq!(default_referer("http://x"), None);
/// ```
pub fn default_referer(url: &str) -> Option<&str> {
    let trimmed = url.strip_suffix('/').unwrap_or(url);
    let idx = trimmed.rfind('/')?;
    if idx >= MIN_REFERER_PREFIX {
        Some(&trimmed[..idx])
    } else {
        None
    }
}

/// HTTP fetcher owning its connection pool and identity settings
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = build_http_client(&config)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Identity to inject into a request that carries no `User-Agent`
    ///
    /// With rotation enabled every call yields a freshly generated identity;
    /// the configured one is never mutated, so fetchers can be shared.
    pub fn identity(&self) -> String {
        if self.config.rotate_user_agent {
            generate_identity(&mut rand::thread_rng())
        } else {
            self.config.user_agent.clone()
        }
    }

    pub async fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.fetch(Method::GET, url, None, HeaderMap::new()).await
    }

    pub async fn post(&self, url: &str, body: Vec<u8>, headers: HeaderMap) -> Result<Vec<u8>> {
        self.fetch(Method::POST, url, Some(body), headers).await
    }

    /// Issues a request and returns the full response body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Transport timeout | Retry up to `timeout_retries` times |
    /// | Other transport error | Immediate → `Transport` |
    /// | Status other than 200 | Immediate → `HttpStatus` |
    ///
    /// Retries are spaced by `retry_backoff_ms * attempt`.
    pub async fn fetch(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
        headers: HeaderMap,
    ) -> Result<Vec<u8>> {
        let parsed =
            Url::parse(url).map_err(|e| CrawlError::InvalidRequest(format!("{}: {}", url, e)))?;
        let headers = self.prepare_headers(url, headers)?;

        let mut retries_left = self.config.timeout_retries;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let mut request = self
                .client
                .request(method.clone(), parsed.clone())
                .headers(headers.clone());
            if let Some(body) = &body {
                request = request.body(body.clone());
            }

            tracing::debug!("{} {} (attempt {})", method, url, attempt);

            match request.send().await {
                Ok(response) => return read_body(url, response).await,
                Err(e) if e.is_timeout() && retries_left > 0 => {
                    retries_left -= 1;
                    tracing::warn!(
                        "Timeout on {} {}, retrying ({} retries left)",
                        method,
                        url,
                        retries_left
                    );
                    let backoff = Duration::from_millis(
                        self.config.retry_backoff_ms.saturating_mul(u64::from(attempt)),
                    );
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                }
                Err(e) if e.is_timeout() => {
                    return Err(CrawlError::Timeout {
                        url: url.to_string(),
                        source: e,
                    });
                }
                Err(e) => {
                    return Err(CrawlError::Transport {
                        url: url.to_string(),
                        source: e,
                    });
                }
            }
        }
    }

    /// Fills in `User-Agent` and `Referer` when the caller supplied none
    fn prepare_headers(&self, url: &str, mut headers: HeaderMap) -> Result<HeaderMap> {
        if !headers.contains_key(USER_AGENT) {
            let identity = self.identity();
            let value = HeaderValue::from_str(&identity)
                .map_err(|e| CrawlError::InvalidRequest(format!("user agent: {}", e)))?;
            headers.insert(USER_AGENT, value);
        }

        if !headers.contains_key(REFERER) {
            if let Some(referer) = default_referer(url) {
                let value = HeaderValue::from_str(referer)
                    .map_err(|e| CrawlError::InvalidRequest(format!("referer: {}", e)))?;
                headers.insert(REFERER, value);
            }
        }

        Ok(headers)
    }
}

async fn read_body(url: &str, response: Response) -> Result<Vec<u8>> {
    let status = response.status();
    if status != StatusCode::OK {
        return Err(CrawlError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    match response.bytes().await {
        Ok(bytes) => Ok(bytes.to_vec()),
        Err(e) if e.is_timeout() => Err(CrawlError::Timeout {
            url: url.to_string(),
            source: e,
        }),
        Err(e) => Err(CrawlError::Transport {
            url: url.to_string(),
            source: e,
        }),
    }
}
