//! Oracle Aggregator - Combines trusted quotes into one published price
//!
//! Rejects outliers, then resolves a confidence-weighted average and the
//! absolute minimum into a conservative final price, and reports which
//! sources corroborate it.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

use super::outliers::OutlierRejector;
use super::OracleError;
use crate::types::{AggregationResult, NormalizedQuote};

/// Price aggregator over confidence-gated quotes
#[derive(Debug, Clone)]
pub struct PriceAggregator {
    rejector: OutlierRejector,
    /// Support tolerance as a percentage of the final price
    support_tolerance_pct: f64,
}

impl PriceAggregator {
    pub fn new(rejector: OutlierRejector, support_tolerance_pct: f64) -> Self {
        Self {
            rejector,
            support_tolerance_pct,
        }
    }

    /// Aggregate the gated quote set for one product
    pub fn aggregate(
        &self,
        quotes: Vec<NormalizedQuote>,
        computed_at: DateTime<Utc>,
    ) -> Result<AggregationResult, OracleError> {
        let product_id = match quotes.first() {
            Some(q) => q.product_id.clone(),
            None => return Err(OracleError::EmptyAggregationInput),
        };

        let rejection = self.rejector.reject(&quotes);
        let filtered = rejection.kept;

        let absolute_min = Self::absolute_min(&filtered).ok_or(OracleError::EmptyAggregationInput)?;
        let weighted_avg = Self::weighted_price(&filtered).ok_or(OracleError::EmptyAggregationInput)?;

        // Conservative: never publish above the cheapest credible observation
        let final_price = absolute_min.min(weighted_avg);
        let supporting_sources = self.support_set(&filtered, final_price);

        tracing::info!(
            product_id = %product_id,
            min = absolute_min,
            weighted = weighted_avg,
            final_price,
            sources = quotes.len(),
            support = supporting_sources.len(),
            outliers = rejection.removed,
            "Price aggregated"
        );

        Ok(AggregationResult {
            product_id,
            final_price_minor: final_price,
            absolute_min_minor: absolute_min,
            weighted_avg_minor: weighted_avg,
            supporting_sources,
            sources_count: quotes.len(),
            outliers_removed_count: rejection.removed,
            all_quotes: quotes,
            computed_at,
        })
    }

    fn absolute_min(quotes: &[NormalizedQuote]) -> Option<i64> {
        quotes.iter().map(|q| q.minor_units).min()
    }

    /// Confidence-weighted average in minor units, floored.
    ///
    /// Summed in `Decimal`, so an exact integer average stays exact.
    /// Falls back to the minimum when every weight is zero.
    pub fn weighted_price(quotes: &[NormalizedQuote]) -> Option<i64> {
        let absolute_min = Self::absolute_min(quotes)?;

        let (weighted_sum, total_weight) =
            quotes.iter().fold((Decimal::ZERO, Decimal::ZERO), |(sum, w), q| {
                let weight = Decimal::from_f64(q.confidence.max(0.0)).unwrap_or(Decimal::ZERO);
                (sum + Decimal::from(q.minor_units) * weight, w + weight)
            });

        if total_weight <= Decimal::ZERO {
            return Some(absolute_min);
        }
        (weighted_sum / total_weight).floor().to_i64()
    }

    /// Absolute tolerance around the final price, never below one minor unit
    pub fn tolerance(&self, final_price: i64) -> i64 {
        let pct = (final_price as f64 * self.support_tolerance_pct / 100.0).floor() as i64;
        pct.max(1)
    }

    /// Sources whose quote lies within tolerance of the final price
    pub fn support_set(&self, quotes: &[NormalizedQuote], final_price: i64) -> BTreeSet<String> {
        let tolerance = self.tolerance(final_price);
        quotes
            .iter()
            .filter(|q| (q.minor_units - final_price).abs() <= tolerance)
            .map(|q| q.source_id.clone())
            .collect()
    }
}

impl Default for PriceAggregator {
    fn default() -> Self {
        Self::new(OutlierRejector::default(), 1.0) // 1.5 IQR fences, 4+ samples, 1% support band
    }
}
