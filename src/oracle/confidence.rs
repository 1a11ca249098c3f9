//! Confidence stage - age decay followed by the acceptance gate

use chrono::{DateTime, Utc};

use super::OracleError;
use crate::types::NormalizedQuote;

/// Quotes must score strictly above this to be trusted
pub const CONFIDENCE_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct ConfidenceFilter {
    threshold: f64,
    decay_per_hour: f64,
    min_decay_factor: f64,
}

impl ConfidenceFilter {
    pub fn new(threshold: f64, decay_per_hour: f64, min_decay_factor: f64) -> Self {
        Self {
            threshold,
            decay_per_hour,
            min_decay_factor,
        }
    }

    /// Multiplier for a quote observed at `observed_at`, in [min_decay_factor, 1].
    /// Future timestamps count as fresh.
    pub fn decay_factor(&self, observed_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_hours = (now - observed_at).num_milliseconds().max(0) as f64 / 3_600_000.0;
        (1.0 - age_hours * self.decay_per_hour).max(self.min_decay_factor)
    }

    /// Replace each quote's confidence with its age-decayed value
    pub fn apply_decay(&self, quotes: Vec<NormalizedQuote>, now: DateTime<Utc>) -> Vec<NormalizedQuote> {
        quotes
            .into_iter()
            .map(|mut q| {
                if let Some(observed_at) = q.raw.observed_at {
                    q.confidence = q.raw.confidence * self.decay_factor(observed_at, now);
                }
                q
            })
            .collect()
    }

    /// Decay, then keep only quotes above the threshold.
    ///
    /// An empty survivor set is a hard failure: low-confidence data must never
    /// become a published price.
    pub fn filter(
        &self,
        product_id: &str,
        quotes: Vec<NormalizedQuote>,
        now: DateTime<Utc>,
    ) -> Result<Vec<NormalizedQuote>, OracleError> {
        let total = quotes.len();
        let accepted: Vec<NormalizedQuote> = self
            .apply_decay(quotes, now)
            .into_iter()
            .filter(|q| q.confidence > self.threshold)
            .collect();

        tracing::debug!(
            product_id,
            total,
            accepted = accepted.len(),
            threshold = self.threshold,
            "Confidence gate applied"
        );

        if accepted.is_empty() {
            return Err(OracleError::NoHighConfidenceMatches {
                product_id: product_id.to_string(),
                threshold: self.threshold,
            });
        }
        Ok(accepted)
    }
}

impl Default for ConfidenceFilter {
    fn default() -> Self {
        Self::new(CONFIDENCE_THRESHOLD, 0.05, 0.5)
    }
}
