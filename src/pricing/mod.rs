//! Pricing service
//!
//! Turns an oracle run into a published price: falls back to the last known
//! price when aggregation fails, derives the discounted display price,
//! records both on-chain, persists the row and notifies subscribers.

pub mod submitter;

pub use submitter::{ChainSubmitter, DisabledSubmitter, SubmissionOutcome, SubmissionStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::broadcast::{ChainStatus, PriceBroadcaster, PriceUpdate};
use crate::oracle::{OracleError, PriceOracle};
use crate::persistence::{join_list, CsvPersistence, PriceRecord};
use crate::types::{format_minor, AggregationResult, ProductDescriptor};

#[derive(Debug, Error)]
pub enum PricingError {
    #[error("no price available for product {product_id}")]
    NoPriceAvailable {
        product_id: String,
        #[source]
        cause: OracleError,
    },
}

/// Result of one pricing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuoteOutcome {
    pub product_id: String,
    pub lowest_minor: i64,
    pub display_minor: i64,
    pub display_price_readable: String,
    pub margin_percent: f64,
    pub supporting_sources: Vec<String>,
    pub all_sources: Vec<String>,
    /// Set when the oracle failed and the last known price was used
    pub fallback_reason: Option<String>,
    pub lowest_submission: SubmissionOutcome,
    pub display_submission: SubmissionOutcome,
    pub computed_at: DateTime<Utc>,
}

impl PriceQuoteOutcome {
    pub fn from_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Display price: `lowest` discounted by the whole-number part of `margin_percent`.
///
/// Integer arithmetic, truncating toward zero.
pub fn display_price(lowest_minor: i64, margin_percent: f64) -> i64 {
    let keep = 100 - margin_percent.trunc() as i128;
    (lowest_minor as i128 * keep / 100) as i64
}

pub struct PricingService {
    oracle: Arc<PriceOracle>,
    submitter: Arc<dyn ChainSubmitter>,
    persistence: Option<Arc<CsvPersistence>>,
    broadcaster: PriceBroadcaster,
    margin_percent: f64,
    currency: String,
    /// Lowest prices confirmed on-chain during this process
    last_known: RwLock<HashMap<String, i64>>,
}

impl PricingService {
    pub fn new(
        oracle: Arc<PriceOracle>,
        submitter: Arc<dyn ChainSubmitter>,
        broadcaster: PriceBroadcaster,
        margin_percent: f64,
    ) -> Self {
        Self {
            oracle,
            submitter,
            persistence: None,
            broadcaster,
            margin_percent,
            currency: "INR".to_string(),
            last_known: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_persistence(mut self, persistence: Arc<CsvPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn broadcaster(&self) -> &PriceBroadcaster {
        &self.broadcaster
    }

    /// Last known lowest price: confirmed in this process, else from the catalog
    pub async fn last_known_price(&self, product: &ProductDescriptor) -> Option<i64> {
        let confirmed = self.last_known.read().await.get(&product.product_id).copied();
        confirmed.or(product.last_known_price_minor)
    }

    /// Price one product end to end
    pub async fn compute(&self, product: &ProductDescriptor) -> Result<PriceQuoteOutcome, PricingError> {
        let product_id = product.product_id.as_str();

        let (lowest, aggregated, fallback_reason) = match self.oracle.aggregate_product(product).await {
            Ok(result) => (result.final_price_minor, Some(result), None),
            Err(e) => {
                let Some(last) = self.last_known_price(product).await else {
                    tracing::warn!(product_id, error = %e, "Aggregation failed and no last known price");
                    return Err(PricingError::NoPriceAvailable {
                        product_id: product_id.to_string(),
                        cause: e,
                    });
                };
                tracing::info!(product_id, error = %e, last_known = last, "Aggregation failed, using last known price");
                (last, None, Some(e.to_string()))
            }
        };

        let display_minor = display_price(lowest, self.margin_percent);

        let lowest_submission = self.submit(product_id, lowest, "lowest").await;
        if lowest_submission.is_confirmed() {
            self.last_known.write().await.insert(product_id.to_string(), lowest);
        }
        let display_submission = self.submit(product_id, display_minor, "display").await;

        let (supporting_sources, all_sources) = source_lists(aggregated.as_ref());
        let computed_at = aggregated.as_ref().map(|a| a.computed_at).unwrap_or_else(Utc::now);

        let outcome = PriceQuoteOutcome {
            product_id: product_id.to_string(),
            lowest_minor: lowest,
            display_minor,
            display_price_readable: format!("{} {}", self.currency, format_minor(display_minor)),
            margin_percent: self.margin_percent,
            supporting_sources,
            all_sources,
            fallback_reason,
            lowest_submission,
            display_submission,
            computed_at,
        };

        self.persist(&outcome, aggregated.as_ref()).await;

        self.broadcaster.broadcast_price(PriceUpdate {
            product_id: outcome.product_id.clone(),
            lowest_minor: outcome.lowest_minor,
            display_minor: outcome.display_minor,
            display_price_readable: outcome.display_price_readable.clone(),
            margin_percent: outcome.margin_percent,
            chain: ChainStatus {
                lowest_tx_id: outcome.lowest_submission.tx_id.clone(),
                display_tx_id: outcome.display_submission.tx_id.clone(),
                lowest_confirmed: outcome.lowest_submission.is_confirmed(),
                display_confirmed: outcome.display_submission.is_confirmed(),
            },
            timestamp: outcome.computed_at.timestamp_millis(),
        });

        tracing::info!(
            product_id,
            lowest,
            display_minor,
            fallback = outcome.from_fallback(),
            "Price computed"
        );

        Ok(outcome)
    }

    async fn submit(&self, product_id: &str, price_minor: i64, label: &str) -> SubmissionOutcome {
        match self.submitter.submit(product_id, price_minor).await {
            Ok(outcome) => {
                if outcome.is_confirmed() {
                    tracing::info!(product_id, price_minor, kind = label, tx_id = ?outcome.tx_id, "Chain submission confirmed");
                }
                outcome
            }
            Err(e) => {
                tracing::warn!(product_id, kind = label, error = %e, "Chain submission failed, continuing");
                SubmissionOutcome::failed(e.to_string())
            }
        }
    }

    async fn persist(&self, outcome: &PriceQuoteOutcome, aggregated: Option<&AggregationResult>) {
        let Some(persistence) = &self.persistence else {
            return;
        };

        let record = PriceRecord {
            timestamp: outcome.computed_at.timestamp_millis(),
            product_id: outcome.product_id.clone(),
            lowest_minor: outcome.lowest_minor,
            display_minor: outcome.display_minor,
            margin_percent: outcome.margin_percent,
            supporting_sources: join_list(outcome.supporting_sources.iter().map(String::as_str)),
            all_sources: join_list(outcome.all_sources.iter().map(String::as_str)),
            sources_count: aggregated.map(|a| a.sources_count).unwrap_or(0),
            outliers_removed: aggregated.map(|a| a.outliers_removed_count).unwrap_or(0),
            from_fallback: outcome.from_fallback(),
            tx_id: outcome
                .display_submission
                .tx_id
                .clone()
                .or_else(|| outcome.lowest_submission.tx_id.clone()),
        };

        if let Err(e) = persistence.save_price(record).await {
            tracing::warn!(product_id = %outcome.product_id, error = %e, "Failed to persist price row");
        }
        if let Some(result) = aggregated {
            if let Err(e) = persistence.save_quotes(result).await {
                tracing::warn!(product_id = %outcome.product_id, error = %e, "Failed to persist quotes");
            }
        }
    }
}

fn source_lists(aggregated: Option<&AggregationResult>) -> (Vec<String>, Vec<String>) {
    match aggregated {
        Some(result) => (
            result.supporting_sources.iter().cloned().collect(),
            result.all_quotes.iter().map(|q| q.source_id.clone()).collect(),
        ),
        None => (Vec::new(), Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_price_truncates_margin_and_result() {
        assert_eq!(display_price(10_000, 3.0), 9_700);
        // 3.9% behaves as 3%
        assert_eq!(display_price(10_000, 3.9), 9_700);
        // 999 * 97 / 100 = 969.03
        assert_eq!(display_price(999, 3.0), 969);
        assert_eq!(display_price(12_345, 0.0), 12_345);
    }

    #[test]
    fn display_price_handles_large_values() {
        let big = i64::MAX / 50;
        assert_eq!(display_price(big, 3.0), (big as i128 * 97 / 100) as i64);
    }
}
