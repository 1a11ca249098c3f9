//! Best-effort price extraction from scraped payloads
//!
//! These are heuristics shared by the concrete sources, not a contract.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// JSON keys that usually carry a price
const PRICE_KEY_HINTS: &[&str] = &[
    "price",
    "amount",
    "current_price",
    "offerprice",
    "saleprice",
    "selling_price",
];

/// Plausible range for a scraped rupee amount
const MIN_PLAUSIBLE: f64 = 50.0;
const MAX_PLAUSIBLE: f64 = 2_000_000.0;

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d[\d,]*\.?\d*").expect("valid number regex"))
}

fn rupee_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:₹|Rs\.?)\s*([0-9][0-9, ]*(?:\.[0-9]{1,2})?)").expect("valid rupee regex")
    })
}

/// First number in free text, thousands separators removed
pub fn first_number(text: &str) -> Option<f64> {
    let m = number_re().find(text)?;
    m.as_str().replace(',', "").trim_end_matches('.').parse().ok()
}

/// Walk arbitrary JSON and return the median of all price-like values
pub fn price_from_json(data: &Value) -> Option<f64> {
    let mut candidates = Vec::new();
    collect_prices(data, &mut candidates);
    candidates.retain(|v| v.is_finite());
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(candidates[candidates.len() / 2])
}

fn collect_prices(node: &Value, out: &mut Vec<f64>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                let key = key.to_lowercase();
                if PRICE_KEY_HINTS.iter().any(|hint| key.contains(hint)) {
                    match value {
                        Value::Number(n) => out.extend(n.as_f64()),
                        Value::String(s) => out.extend(first_number(s)),
                        Value::Object(inner) => {
                            let nested = inner.get("value").or_else(|| inner.get("amount"));
                            if let Some(v) = nested.and_then(Value::as_f64) {
                                out.push(v);
                            }
                        }
                        _ => {}
                    }
                }
                collect_prices(value, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_prices(item, out);
            }
        }
        _ => {}
    }
}

/// Rupee-prefixed amounts in a page, deduplicated in order of appearance
/// and limited to a plausible range
pub fn rupee_candidates(text: &str) -> Vec<f64> {
    let mut values: Vec<f64> = Vec::new();
    for caps in rupee_re().captures_iter(text) {
        let Some(raw) = caps.get(1) else { continue };
        let cleaned: String = raw
            .as_str()
            .chars()
            .filter(|c| *c != ',' && *c != ' ')
            .collect();
        if let Ok(v) = cleaned.parse::<f64>() {
            if !values.contains(&v) {
                values.push(v);
            }
        }
    }
    values.retain(|v| (MIN_PLAUSIBLE..=MAX_PLAUSIBLE).contains(v));
    values
}

/// Median of the lower half, which skips struck-through MRPs and bundles
pub fn pick_price(candidates: &[f64]) -> Option<f64> {
    if candidates.is_empty() {
        return None;
    }
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let half = &sorted[..(sorted.len() / 2).max(1)];
    Some(half[half.len() / 2])
}

/// Capture group 1 of `pattern` in `text`, parsed as a number
pub fn tagged_price(pattern: &Regex, text: &str) -> Option<f64> {
    let caps = pattern.captures(text)?;
    let raw = caps.get(1).or_else(|| caps.get(0))?;
    first_number(raw.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_walk_finds_nested_prices() {
        let data = json!({
            "results": [
                {"title": "Hoodie", "price": 2999},
                {"title": "Hoodie XL", "offerPrice": "₹3,199"},
                {"title": "Hoodie L", "sale_info": {"salePrice": {"value": 3099.0}}}
            ],
            "count": 3
        });
        assert_eq!(price_from_json(&data), Some(3099.0));
    }

    #[test]
    fn json_without_prices_yields_nothing() {
        assert_eq!(price_from_json(&json!({"items": [], "total": 12})), None);
    }

    #[test]
    fn rupee_candidates_dedup_and_filter() {
        let page = "MRP ₹ 4,999 now ₹2,999 | Rs. 2,999 | EMI from ₹ 12 | Rs.1,50,000";
        assert_eq!(rupee_candidates(page), vec![4999.0, 2999.0, 150000.0]);
    }

    #[test]
    fn pick_price_takes_lower_half_median() {
        assert_eq!(pick_price(&[4999.0, 2999.0, 150000.0, 3100.0]), Some(3100.0));
        assert_eq!(pick_price(&[799.0]), Some(799.0));
        assert_eq!(pick_price(&[]), None);
    }

    #[test]
    fn tagged_price_reads_capture_group() {
        let re = Regex::new(r#"class="final-price"[^>]*>\s*([^<]+)"#).unwrap();
        let html = r#"<span class="final-price">₹ 1,899</span>"#;
        assert_eq!(tagged_price(&re, html), Some(1899.0));
    }
}
