//! Retailer product-page scraper
//!
//! Fetches either the product's registered URL for this source or a search
//! page built from a template, then reads the price from the HTML.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;

use super::extract::{pick_price, rupee_candidates, tagged_price};
use super::http::HttpClient;
use super::PriceSource;
use crate::types::{ProductDescriptor, RawQuote};

#[derive(Debug, Clone)]
pub struct ProductPageSource {
    name: String,
    /// Search URL with a `{query}` placeholder
    search_url: Option<String>,
    /// Regex whose first capture group holds the price
    price_pattern: Option<Regex>,
    /// Confidence when `price_pattern` matched
    tagged_confidence: f64,
    /// Confidence when falling back to rupee-prefixed amounts in the page
    untagged_confidence: f64,
}

impl ProductPageSource {
    pub fn new(name: impl Into<String>, tagged_confidence: f64, untagged_confidence: f64) -> Self {
        Self {
            name: name.into(),
            search_url: None,
            price_pattern: None,
            tagged_confidence,
            untagged_confidence,
        }
    }

    pub fn with_search_url(mut self, template: impl Into<String>) -> Self {
        self.search_url = Some(template.into());
        self
    }

    pub fn with_price_pattern(mut self, pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern)
            .with_context(|| format!("Invalid price pattern for source {}", self.name))?;
        self.price_pattern = Some(re);
        Ok(self)
    }

    /// Page to scrape: the registered product URL wins over the search template
    pub fn target_url(&self, product: &ProductDescriptor) -> Option<String> {
        if let Some(url) = product.url_for(&self.name) {
            return Some(url.to_string());
        }
        let template = self.search_url.as_deref()?;
        let query = form_encode(&product.search_query())?;
        Some(template.replace("{query}", &query))
    }

    /// Price and confidence read from a page body
    pub fn extract(&self, html: &str) -> Option<(f64, f64)> {
        if let Some(re) = &self.price_pattern {
            if let Some(price) = tagged_price(re, html).filter(|p| *p > 0.0) {
                return Some((price, self.tagged_confidence));
            }
        }
        let price = pick_price(&rupee_candidates(html))?;
        Some((price, self.untagged_confidence))
    }
}

/// `application/x-www-form-urlencoded` form of a single query value
fn form_encode(value: &str) -> Option<String> {
    let url = reqwest::Url::parse_with_params("http://localhost/", &[("q", value)]).ok()?;
    url.query()?.strip_prefix("q=").map(str::to_string)
}

#[async_trait]
impl PriceSource for ProductPageSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        http: &HttpClient,
        product: &ProductDescriptor,
    ) -> Result<Option<RawQuote>> {
        let Some(url) = self.target_url(product) else {
            tracing::debug!(source = %self.name, product_id = %product.product_id, "No page to scrape");
            return Ok(None);
        };

        let Some(html) = http.get_text(&url, &[]).await else {
            tracing::info!(source = %self.name, url = %url, "Page unavailable");
            return Ok(None);
        };

        Ok(self.extract(&html).map(|(price, confidence)| {
            RawQuote::priced(self.name.clone(), product.product_id.clone(), price, confidence)
        }))
    }
}
