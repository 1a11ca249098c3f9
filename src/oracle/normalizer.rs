//! Normalizer - converts raw source records to integer minor units
//!
//! Malformed records are dropped one by one; the batch always continues.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

use crate::types::{NormalizedQuote, RawQuote, SourceQuote, DEFAULT_CONFIDENCE};

/// Reason a single source record was dropped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedQuote {
    #[error("missing price")]
    MissingPrice,

    #[error("non-numeric {field}: {value}")]
    NonNumeric { field: &'static str, value: String },

    #[error("negative {field}")]
    Negative { field: &'static str },

    #[error("confidence is not a finite number")]
    InvalidConfidence,

    #[error("price overflows minor units")]
    Overflow,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    default_confidence: f64,
}

impl Normalizer {
    pub fn new(default_confidence: f64) -> Self {
        Self { default_confidence }
    }

    /// Normalize a batch, preserving input order
    pub fn normalize(&self, raw: &[RawQuote]) -> Vec<NormalizedQuote> {
        raw.iter()
            .filter_map(|record| match self.normalize_one(record) {
                Ok(quote) => Some(quote),
                Err(e) => {
                    tracing::debug!(
                        source = %record.source_id,
                        product_id = %record.product_id,
                        reason = %e,
                        "Dropping malformed source quote"
                    );
                    None
                }
            })
            .collect()
    }

    pub fn normalize_one(&self, raw: &RawQuote) -> Result<NormalizedQuote, MalformedQuote> {
        let quote = self.validate(raw)?;
        let minor_units = quote.minor_units().ok_or(MalformedQuote::Overflow)?;

        Ok(NormalizedQuote {
            source_id: quote.source_id.clone(),
            product_id: quote.product_id.clone(),
            minor_units,
            confidence: quote.confidence,
            raw: quote,
        })
    }

    /// Parse the untyped fields of a raw record into a `SourceQuote`
    pub fn validate(&self, raw: &RawQuote) -> Result<SourceQuote, MalformedQuote> {
        let price_value = match &raw.price {
            None | Some(Value::Null) => return Err(MalformedQuote::MissingPrice),
            Some(v) => v,
        };
        let unit_price = parse_amount(price_value).ok_or_else(|| MalformedQuote::NonNumeric {
            field: "price",
            value: price_value.to_string(),
        })?;
        if unit_price.is_sign_negative() && !unit_price.is_zero() {
            return Err(MalformedQuote::Negative { field: "price" });
        }

        let shipping = match &raw.shipping {
            None | Some(Value::Null) => Decimal::ZERO,
            Some(v) => parse_amount(v).ok_or_else(|| MalformedQuote::NonNumeric {
                field: "shipping",
                value: v.to_string(),
            })?,
        };
        if shipping.is_sign_negative() && !shipping.is_zero() {
            return Err(MalformedQuote::Negative { field: "shipping" });
        }

        let confidence = match raw.confidence {
            None => self.default_confidence,
            Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
            Some(_) => return Err(MalformedQuote::InvalidConfidence),
        };

        Ok(SourceQuote {
            source_id: raw.source_id.clone(),
            product_id: raw.product_id.clone(),
            unit_price,
            shipping,
            confidence,
            observed_at: raw.observed_at,
        })
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE)
    }
}

/// Parse a JSON number or numeric string as an exact decimal.
///
/// Numbers go through their shortest textual form so `19.995` stays
/// `19.995` instead of picking up binary rounding noise.
pub fn parse_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                return None;
            }
            parse_decimal(&cleaned)
        }
        _ => None,
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}
