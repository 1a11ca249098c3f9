//! Oracle module - Multi-source product price aggregation
//!
//! Fetches quotes for a product from every registered source, normalizes
//! them to integer minor units, keeps only high-confidence observations,
//! rejects outliers and produces one conservative consensus price.
//!
//! Pipeline: fetch -> normalize -> decay + confidence gate -> aggregate.

mod aggregator;
mod clock;
mod confidence;
mod error;
mod fetcher;
mod normalizer;
mod outliers;
pub mod sources;

pub use aggregator::PriceAggregator;
pub use clock::{Clock, FixedClock, SystemClock};
pub use confidence::{ConfidenceFilter, CONFIDENCE_THRESHOLD};
pub use error::OracleError;
pub use fetcher::SourceFetcher;
pub use normalizer::{parse_amount, MalformedQuote, Normalizer};
pub use outliers::{quartiles, OutlierRejector, Rejection};

use std::sync::Arc;

use crate::config::OracleConfig;
use crate::types::{AggregationResult, NormalizedQuote, ProductDescriptor, RawQuote};
use sources::{HttpClient, SourceRegistry};

/// End-to-end price oracle for one product at a time
pub struct PriceOracle {
    fetcher: SourceFetcher,
    registry: SourceRegistry,
    normalizer: Normalizer,
    confidence: ConfidenceFilter,
    aggregator: PriceAggregator,
    clock: Arc<dyn Clock>,
}

impl PriceOracle {
    pub fn new(
        fetcher: SourceFetcher,
        registry: SourceRegistry,
        normalizer: Normalizer,
        confidence: ConfidenceFilter,
        aggregator: PriceAggregator,
    ) -> Self {
        Self {
            fetcher,
            registry,
            normalizer,
            confidence,
            aggregator,
            clock: Arc::new(SystemClock),
        }
    }

    /// Wire every stage from the `oracle` config section
    pub fn from_config(cfg: &OracleConfig, http: HttpClient, registry: SourceRegistry) -> Self {
        Self::new(
            SourceFetcher::new(http, cfg.source_timeout()),
            registry,
            Normalizer::new(cfg.default_confidence),
            ConfidenceFilter::new(cfg.confidence_threshold, cfg.decay_per_hour, cfg.min_decay_factor),
            PriceAggregator::new(
                OutlierRejector::new(cfg.outlier_iqr_multiplier, cfg.min_outlier_samples),
                cfg.support_tolerance_pct,
            ),
        )
    }

    /// Replace the time source used for decay and `computed_at`
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Fetch, normalize, gate and aggregate one product
    pub async fn aggregate_product(
        &self,
        product: &ProductDescriptor,
    ) -> Result<AggregationResult, OracleError> {
        let raw = self.fetcher.fetch(&self.registry, product).await?;
        self.aggregate_quotes(&product.product_id, &raw)
    }

    /// Pure part of the pipeline, starting from already fetched quotes
    pub fn aggregate_quotes(
        &self,
        product_id: &str,
        raw: &[RawQuote],
    ) -> Result<AggregationResult, OracleError> {
        if raw.is_empty() {
            return Err(OracleError::NoAdapterResults {
                product_id: product_id.to_string(),
            });
        }

        let now = self.clock.now();
        let normalized: Vec<NormalizedQuote> = self.normalizer.normalize(raw);
        let gated = self.confidence.filter(product_id, normalized, now)?;
        self.aggregator.aggregate(gated, now)
    }
}
