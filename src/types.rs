//! Core types used throughout PriceOracle
//!
//! Defines product descriptors, per-source quotes at each pipeline stage,
//! and the aggregation result handed to downstream collaborators.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Minor units per major currency unit (paise per rupee, cents per dollar)
pub const MINOR_PER_MAJOR: Decimal = dec!(100);

/// Confidence assumed when a source does not report one
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Product to be priced, as handed to every source adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDescriptor {
    pub product_id: String,
    pub name: String,
    pub brand: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Last published lowest price, used when a fresh aggregation fails
    #[serde(default)]
    pub last_known_price_minor: Option<i64>,
    /// Reference URLs keyed by source name
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ProductDescriptor {
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        brand: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            brand: brand.into(),
            model: None,
            category: None,
            last_known_price_minor: None,
            urls: BTreeMap::new(),
            active: true,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_url(mut self, source: impl Into<String>, url: impl Into<String>) -> Self {
        self.urls.insert(source.into(), url.into());
        self
    }

    pub fn with_last_known_price(mut self, minor: i64) -> Self {
        self.last_known_price_minor = Some(minor);
        self
    }

    /// Free-text search query ("name brand model")
    pub fn search_query(&self) -> String {
        let mut query = format!("{} {}", self.name, self.brand);
        if let Some(model) = self.model.as_deref() {
            query.push(' ');
            query.push_str(model);
        }
        query.trim().to_string()
    }

    /// Reference URL registered for a given source, if any
    pub fn url_for(&self, source: &str) -> Option<&str> {
        self.urls.get(source).map(String::as_str)
    }
}

impl fmt::Display for ProductDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.product_id, self.brand, self.name)
    }
}

/// Unvalidated record returned by a source adapter.
///
/// Price and shipping are kept as raw JSON values because sources scrape
/// them from arbitrary payloads; the normalizer decides what is usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    pub source_id: String,
    pub product_id: String,
    #[serde(default)]
    pub price: Option<serde_json::Value>,
    #[serde(default)]
    pub shipping: Option<serde_json::Value>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
}

impl RawQuote {
    /// Quote with a numeric major-unit price and no shipping
    pub fn priced(
        source_id: impl Into<String>,
        product_id: impl Into<String>,
        price: f64,
        confidence: f64,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            product_id: product_id.into(),
            price: Some(serde_json::json!(price)),
            shipping: None,
            confidence: Some(confidence),
            observed_at: None,
        }
    }

    pub fn with_shipping(mut self, shipping: f64) -> Self {
        self.shipping = Some(serde_json::json!(shipping));
        self
    }

    pub fn observed_at(mut self, ts: DateTime<Utc>) -> Self {
        self.observed_at = Some(ts);
        self
    }
}

/// Validated observation from one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceQuote {
    pub source_id: String,
    pub product_id: String,
    /// Unit price in major currency units
    pub unit_price: Decimal,
    /// Shipping in major currency units (>= 0)
    pub shipping: Decimal,
    /// Reported confidence in [0, 1]
    pub confidence: f64,
    pub observed_at: Option<DateTime<Utc>>,
}

impl SourceQuote {
    /// Total landed cost in minor units, floored
    pub fn minor_units(&self) -> Option<i64> {
        to_minor_units(self.unit_price, self.shipping)
    }
}

/// Quote converted to integer minor units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuote {
    pub source_id: String,
    pub product_id: String,
    pub minor_units: i64,
    /// Effective confidence, decayed by age once the confidence stage ran
    pub confidence: f64,
    pub raw: SourceQuote,
}

/// Outcome of one aggregation run for a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub product_id: String,
    pub final_price_minor: i64,
    pub absolute_min_minor: i64,
    pub weighted_avg_minor: i64,
    pub supporting_sources: BTreeSet<String>,
    pub all_quotes: Vec<NormalizedQuote>,
    pub sources_count: usize,
    pub outliers_removed_count: usize,
    pub computed_at: DateTime<Utc>,
}

/// Convert a major-unit price plus shipping to minor units.
///
/// Always floors: 19.995 becomes 1999, never 2000. Returns `None` when the
/// total does not fit an `i64`.
pub fn to_minor_units(price: Decimal, shipping: Decimal) -> Option<i64> {
    price
        .checked_add(shipping)?
        .checked_mul(MINOR_PER_MAJOR)?
        .floor()
        .to_i64()
}

/// Render minor units as a major-unit string with two decimals
pub fn format_minor(minor: i64) -> String {
    let major = Decimal::new(minor, 2);
    format!("{:.2}", major)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minor_units_always_floor() {
        assert_eq!(to_minor_units(dec!(19.999), Decimal::ZERO), Some(1999));
        assert_eq!(to_minor_units(dec!(19.995), Decimal::ZERO), Some(1999));
        assert_eq!(to_minor_units(dec!(100), dec!(0.5)), Some(10050));
    }

    #[test]
    fn search_query_skips_missing_model() {
        let p = ProductDescriptor::new("hoodie-1", "Zip Hoodie", "Acme");
        assert_eq!(p.search_query(), "Zip Hoodie Acme");

        let p = p.with_model("ZH-22");
        assert_eq!(p.search_query(), "Zip Hoodie Acme ZH-22");
    }

    #[test]
    fn format_minor_renders_two_decimals() {
        assert_eq!(format_minor(299_900), "2999.00");
        assert_eq!(format_minor(1999), "19.99");
    }

    #[test]
    fn descriptor_deserializes_with_defaults() {
        let p: ProductDescriptor = serde_json::from_value(serde_json::json!({
            "product_id": "jeans-2",
            "name": "Slim Jeans",
            "brand": "Denimco"
        }))
        .expect("minimal descriptor should deserialize");
        assert!(p.active);
        assert!(p.urls.is_empty());
        assert_eq!(p.last_known_price_minor, None);
    }
}
