//! Concurrent fan-out over every registered source

use futures_util::future::join_all;
use std::time::Duration;
use tokio::time::timeout;

use super::sources::{HttpClient, SourceRegistry};
use super::OracleError;
use crate::types::{ProductDescriptor, RawQuote};

pub struct SourceFetcher {
    http: HttpClient,
    /// Upper bound for one source's whole lookup
    source_timeout: Duration,
}

impl SourceFetcher {
    pub fn new(http: HttpClient, source_timeout: Duration) -> Self {
        Self {
            http,
            source_timeout,
        }
    }

    /// Query all sources at once and collect what came back.
    ///
    /// Results keep registration order. A source that errors, times out or
    /// has nothing is skipped; only when all of them do is the run aborted.
    pub async fn fetch(
        &self,
        registry: &SourceRegistry,
        product: &ProductDescriptor,
    ) -> Result<Vec<RawQuote>, OracleError> {
        let lookups = registry.iter().map(|source| async move {
            match timeout(self.source_timeout, source.fetch(&self.http, product)).await {
                Ok(Ok(Some(quote))) => Some(quote),
                Ok(Ok(None)) => {
                    tracing::debug!(source = %source.name(), product_id = %product.product_id, "No quote");
                    None
                }
                Ok(Err(e)) => {
                    tracing::warn!(source = %source.name(), product_id = %product.product_id, error = %e, "Source failed");
                    None
                }
                Err(_) => {
                    tracing::warn!(
                        source = %source.name(),
                        product_id = %product.product_id,
                        timeout_ms = self.source_timeout.as_millis() as u64,
                        "Source timed out"
                    );
                    None
                }
            }
        });

        let quotes: Vec<RawQuote> = join_all(lookups).await.into_iter().flatten().collect();

        tracing::debug!(
            product_id = %product.product_id,
            sources = registry.len(),
            quotes = quotes.len(),
            "Fetch complete"
        );

        if quotes.is_empty() {
            return Err(OracleError::NoAdapterResults {
                product_id: product.product_id.clone(),
            });
        }
        Ok(quotes)
    }
}
