//! Gate failures of the aggregation pipeline

use thiserror::Error;

/// Failures that abort an aggregation run.
///
/// Per-record problems (a malformed quote, one failing source, a degenerate
/// outlier set) are recovered locally and never surface here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    /// Every source failed, timed out or had no data
    #[error("no adapter results for product {product_id}")]
    NoAdapterResults { product_id: String },

    /// Quotes were scraped but none cleared the confidence gate
    #[error("no high-confidence matches (>{threshold}) for product {product_id}")]
    NoHighConfidenceMatches { product_id: String, threshold: f64 },

    #[error("no price data to aggregate")]
    EmptyAggregationInput,
}

impl OracleError {
    /// True when sources answered but their data was not trusted
    pub fn is_untrusted_data(&self) -> bool {
        matches!(self, OracleError::NoHighConfidenceMatches { .. })
    }
}
