//! Fetcher: one HTTP GET impersonating a mainstream browser TLS/HTTP
//! fingerprint, routed through a rotating upstream proxy, with fixed-delay
//! retry and status-code-specific classification.
//!
//! Grounded on `original_source/backend/scraper_service.py::fetch_stream`:
//! a fresh client per attempt (forces the proxy pool to rotate egress IP),
//! `impersonate="chrome120"`, a 45s timeout, and up to 10 retries separated
//! by a flat 2s sleep - no exponential backoff, because the proxy pool
//! supplies diversity, not the client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rquest::tls::Impersonate;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::FetchError;

/// Abstracts "perform one page fetch" so `harvest::stream` can be driven by
/// either the real impersonated/proxied client or a fake in tests, without
/// either depending on the other's concrete type.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(
        &self,
        params: &FetchParams,
        is_running: &AtomicBool,
    ) -> Result<String, FetchError>;
}

const BASE_URL: &str = "https://www.hugedomains.com/domain_search.cfm";

/// Request parameters for one page of one `(length, ordering)` stream.
#[derive(Debug, Clone)]
pub struct FetchParams {
    pub start: u32,
    pub length: i32,
    pub sort: &'static str,
    pub next_token: Option<String>,
}

impl FetchParams {
    fn as_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("maxrows", crate::config::RECORDS_PER_PAGE.to_string()),
            ("start", self.start.to_string()),
            ("anchor", "all".to_string()),
            ("length_start", self.length.to_string()),
            ("length_end", self.length.to_string()),
            ("highlightbg", "1".to_string()),
            ("catsearch", "0".to_string()),
            ("sort", self.sort.to_string()),
        ];
        if let Some(token) = &self.next_token {
            pairs.push(("n", token.clone()));
        }
        pairs
    }
}

/// Performs the impersonated, proxied, retried GET described above.
///
/// A cancellation flag is checked before each attempt and before each
/// inter-attempt sleep, so a stopped harvest does not keep retrying.
pub struct Fetcher {
    config: Config,
    headers: HashMap<&'static str, &'static str>,
}

impl Fetcher {
    pub fn new(config: Config) -> Self {
        let mut headers = HashMap::new();
        headers.insert(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        );
        headers.insert("Accept-Language", "en-US,en;q=0.5");
        headers.insert("Connection", "keep-alive");
        headers.insert("Upgrade-Insecure-Requests", "1");
        headers.insert("Sec-Fetch-Dest", "document");
        headers.insert("Sec-Fetch-Mode", "navigate");
        headers.insert("Sec-Fetch-Site", "none");
        headers.insert("Sec-Fetch-User", "?1");
        Self { config, headers }
    }

    /// One GET attempt against a freshly-built client, so every attempt
    /// rotates through the proxy pool's egress IP.
    async fn attempt(&self, params: &FetchParams) -> Result<(u16, String), FetchError> {
        let mut builder = rquest::Client::builder()
            .impersonate(Impersonate::Chrome120)
            .timeout(Duration::from_millis(self.config.fetch_timeout_ms));

        if let Some(proxy_url) = &self.config.proxy_url {
            let proxy = rquest::Proxy::all(proxy_url)
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let mut request = client.get(BASE_URL).query(&params.as_query_pairs());
        for (name, value) in &self.headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok((status, body))
    }

    /// Classifies one attempt's status  and runs the retry policy.
    /// Returns the response body on success, or a terminal `FetchError`
    /// (`TokenExpired` on 302, or the last transient error after retry
    /// exhaustion).
    async fn fetch_impl(
        &self,
        params: &FetchParams,
        is_running: &AtomicBool,
    ) -> Result<String, FetchError> {
        let mut last_error = FetchError::UnexpectedStatus(0);

        for attempt in 0..self.config.retry_attempts {
            if !is_running.load(AtomicOrdering::Relaxed) {
                return Err(last_error);
            }

            match self.attempt(params).await {
                Ok((200, body)) => return Ok(body),
                Ok((302, _)) => return Err(FetchError::TokenExpired),
                Ok((status @ (403 | 429), _)) => {
                    warn!(status, attempt, "upstream blocked request, retrying");
                    last_error = FetchError::Blocked(status);
                }
                Ok((status, _)) => {
                    warn!(status, attempt, "unexpected status, retrying");
                    last_error = FetchError::UnexpectedStatus(status);
                }
                Err(e) => {
                    debug!(attempt, error = %e, "fetch attempt failed, retrying");
                    last_error = e;
                }
            }

            if !last_error.is_retryable() {
                return Err(last_error);
            }

            if !is_running.load(AtomicOrdering::Relaxed) {
                return Err(last_error);
            }
            tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
        }

        Err(last_error)
    }
}

#[async_trait]
impl PageFetcher for Fetcher {
    async fn fetch(
        &self,
        params: &FetchParams,
        is_running: &AtomicBool,
    ) -> Result<String, FetchError> {
        self.fetch_impl(params, is_running).await
    }
}

pub fn sort_query_value(ordering: crate::model::Ordering) -> &'static str {
    ordering.as_query_value()
}
