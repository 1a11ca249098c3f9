//! JSON product-search API source
//!
//! Queries a RapidAPI-style search endpoint with "name brand model" and
//! takes the median price-like value from the response.

use anyhow::Result;
use async_trait::async_trait;

use super::extract::{first_number, price_from_json};
use super::http::HttpClient;
use super::PriceSource;
use crate::types::{ProductDescriptor, RawQuote};

/// Query parameter names tried in order until one yields a price
const QUERY_PARAM_VARIANTS: &[&str] = &["q", "query", "keyword"];

/// Confidence penalty when the body was not JSON and a bare number was used
const TEXT_FALLBACK_PENALTY: f64 = 0.02;

#[derive(Debug, Clone)]
pub struct SearchApiSource {
    name: String,
    /// Host name, or a full base URL including scheme
    host: Option<String>,
    path: String,
    api_key: Option<String>,
    country: Option<String>,
    confidence: f64,
}

impl SearchApiSource {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            host: None,
            path: "/product-search".to_string(),
            api_key: None,
            country: None,
            confidence,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    fn endpoint(host: &str, path: &str) -> String {
        if host.contains("://") {
            format!("{}{}", host.trim_end_matches('/'), path)
        } else {
            format!("https://{}{}", host, path)
        }
    }

    fn host_header(host: &str) -> &str {
        host.split("://").nth(1).unwrap_or(host).trim_end_matches('/')
    }

    fn quote(&self, product: &ProductDescriptor, price: f64, confidence: f64) -> RawQuote {
        RawQuote::priced(self.name.clone(), product.product_id.clone(), price, confidence)
    }
}

#[async_trait]
impl PriceSource for SearchApiSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        http: &HttpClient,
        product: &ProductDescriptor,
    ) -> Result<Option<RawQuote>> {
        let (Some(host), Some(key)) = (self.host.as_deref(), self.api_key.as_deref()) else {
            tracing::debug!(source = %self.name, "Search API not configured, skipping");
            return Ok(None);
        };

        let url = Self::endpoint(host, &self.path);
        let headers = HttpClient::headers_from(&[
            ("X-RapidAPI-Key", key),
            ("X-RapidAPI-Host", Self::host_header(host)),
        ]);
        let query_text = product.search_query();

        for param in QUERY_PARAM_VARIANTS {
            let mut query = vec![(*param, query_text.as_str())];
            if let Some(country) = self.country.as_deref() {
                query.push(("country", country));
            }

            let (status, body) = match http.get_api(&url, &query, headers.clone()).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::info!(source = %self.name, param, error = %e, "Search API attempt failed");
                    continue;
                }
            };
            if status.is_client_error() || status.is_server_error() {
                tracing::debug!(source = %self.name, param, status = status.as_u16(), "Search API rejected query");
                continue;
            }

            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(json) => {
                    if let Some(price) = price_from_json(&json).filter(|p| *p > 0.0) {
                        return Ok(Some(self.quote(product, price, self.confidence)));
                    }
                }
                Err(_) => {
                    if let Some(price) = first_number(&body).filter(|p| *p > 0.0) {
                        let confidence = (self.confidence - TEXT_FALLBACK_PENALTY).max(0.0);
                        return Ok(Some(self.quote(product, price, confidence)));
                    }
                }
            }
        }

        Ok(None)
    }
}
