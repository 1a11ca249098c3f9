//! Shared HTTP client handed to every source adapter
//!
//! One pooled `reqwest::Client` per fetch batch, with a semaphore bounding
//! how many requests are in flight at once. Cloning shares the pool.

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// A small pool of realistic desktop user agents
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

/// Page fetches are attempted this many times before giving up
const PAGE_ATTEMPTS: usize = 2;

#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Maximum concurrent requests (and idle connections per host)
    pub max_connections: usize,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Per-attempt timeout for page fetches
    pub page_timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            request_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            page_timeout: Duration::from_secs(12),
            accept_invalid_certs: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    permits: Arc<Semaphore>,
    page_timeout: Duration,
}

impl HttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let max_connections = settings.max_connections.max(1);
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .pool_max_idle_per_host(max_connections)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .gzip(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(max_connections)),
            page_timeout: settings.page_timeout,
        })
    }

    /// Browser-like default headers with a rotated user agent
    pub fn browser_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        let ua = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        headers.insert(USER_AGENT, HeaderValue::from_static(ua));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-IN,en-US;q=0.9,en;q=0.8"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers
    }

    /// Build a header map from string pairs, skipping invalid entries
    pub fn headers_from(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            match (HeaderName::try_from(*name), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::debug!(header = %name, "Skipping invalid header"),
            }
        }
        headers
    }

    /// GET a page as text.
    ///
    /// Retries once with a fresh user agent; returns `None` when every
    /// attempt failed or answered with an error status.
    pub async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Option<String> {
        for attempt in 1..=PAGE_ATTEMPTS {
            match self.send(url, query, Self::browser_headers(), Some(self.page_timeout)).await {
                Ok((status, body)) if !status.is_client_error() && !status.is_server_error() => {
                    return Some(body);
                }
                Ok((status, _)) => {
                    tracing::debug!(url, attempt, status = status.as_u16(), "Page fetch rejected");
                }
                Err(e) => {
                    tracing::debug!(url, attempt, error = %e, "Page fetch failed");
                }
            }
        }
        None
    }

    /// GET an API endpoint with extra headers.
    ///
    /// Returns the status and body; transport failures are errors.
    pub async fn get_api(
        &self,
        url: &str,
        query: &[(&str, &str)],
        extra_headers: HeaderMap,
    ) -> Result<(StatusCode, String)> {
        let mut headers = Self::browser_headers();
        headers.extend(extra_headers);
        self.send(url, query, headers, None).await
    }

    async fn send(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: HeaderMap,
        timeout: Option<Duration>,
    ) -> Result<(StatusCode, String)> {
        let _permit = self
            .permits
            .acquire()
            .await
            .context("HTTP client permits closed")?;

        let mut request = self.client.get(url).query(query).headers(headers);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read body from {}", url))?;
        Ok((status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_headers_rotate_from_pool() {
        let headers = HttpClient::browser_headers();
        let ua = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .expect("user agent should be set");
        assert!(USER_AGENTS.contains(&ua));
        assert!(headers.contains_key(ACCEPT_LANGUAGE));
    }

    #[test]
    fn invalid_headers_are_skipped() {
        let headers = HttpClient::headers_from(&[("X-RapidAPI-Key", "k"), ("bad header", "v")]);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-rapidapi-key").unwrap(), "k");
    }
}
