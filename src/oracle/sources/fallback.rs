//! Ordered fallback chain presented as a single source

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::http::HttpClient;
use super::PriceSource;
use crate::types::{ProductDescriptor, RawQuote};

/// Tries each inner source in order and returns the first quote.
///
/// Quotes are re-labelled with the chain's name so the whole chain counts
/// as one source downstream.
pub struct FallbackSource {
    name: String,
    chain: Vec<Arc<dyn PriceSource>>,
}

impl FallbackSource {
    pub fn new(name: impl Into<String>, chain: Vec<Arc<dyn PriceSource>>) -> Self {
        Self {
            name: name.into(),
            chain,
        }
    }
}

#[async_trait]
impl PriceSource for FallbackSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        http: &HttpClient,
        product: &ProductDescriptor,
    ) -> Result<Option<RawQuote>> {
        for (idx, source) in self.chain.iter().enumerate() {
            match source.fetch(http, product).await {
                Ok(Some(mut quote)) => {
                    quote.source_id = self.name.clone();
                    return Ok(Some(quote));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::info!(source = %self.name, step = idx, error = %e, "Fallback step failed");
                }
            }
        }
        Ok(None)
    }
}
