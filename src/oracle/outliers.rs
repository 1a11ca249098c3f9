//! Outlier rejection on minor-unit values using the interquartile range

use crate::types::NormalizedQuote;

#[derive(Debug, Clone)]
pub struct OutlierRejector {
    /// Fence width in IQRs on each side of the quartiles
    iqr_multiplier: f64,
    /// Below this many values rejection is skipped
    min_samples: usize,
}

/// Quotes that survived rejection plus how many were dropped
#[derive(Debug, Clone)]
pub struct Rejection {
    pub kept: Vec<NormalizedQuote>,
    pub removed: usize,
}

impl OutlierRejector {
    pub fn new(iqr_multiplier: f64, min_samples: usize) -> Self {
        Self {
            iqr_multiplier,
            min_samples: min_samples.max(2),
        }
    }

    /// Values inside `[Q1 - m*IQR, Q3 + m*IQR]`, in input order
    pub fn reject_values(&self, values: &[i64]) -> Vec<i64> {
        if values.len() < self.min_samples {
            return values.to_vec();
        }
        let Some((q1, q3)) = quartiles(values) else {
            return values.to_vec();
        };
        let iqr = q3 - q1;
        if iqr == 0.0 {
            return values.to_vec();
        }

        let lower = q1 - self.iqr_multiplier * iqr;
        let upper = q3 + self.iqr_multiplier * iqr;
        let filtered: Vec<i64> = values
            .iter()
            .copied()
            .filter(|v| {
                let v = *v as f64;
                v >= lower && v <= upper
            })
            .collect();

        tracing::debug!(
            before = values.len(),
            after = filtered.len(),
            q1,
            q3,
            "Outlier rejection"
        );
        filtered
    }

    /// Reject outlying quotes.
    ///
    /// Quotes are re-matched against surviving *values*, so several sources
    /// quoting the same amount are kept or dropped together. If nothing would
    /// survive, the input is returned unchanged.
    pub fn reject(&self, quotes: &[NormalizedQuote]) -> Rejection {
        let values: Vec<i64> = quotes.iter().map(|q| q.minor_units).collect();
        let surviving = self.reject_values(&values);

        if surviving.is_empty() {
            let product_id = quotes.first().map(|q| q.product_id.as_str()).unwrap_or("");
            tracing::warn!(
                product_id,
                count = quotes.len(),
                "All values were outliers, keeping unfiltered set"
            );
            return Rejection {
                kept: quotes.to_vec(),
                removed: 0,
            };
        }

        let kept: Vec<NormalizedQuote> = quotes
            .iter()
            .filter(|q| surviving.contains(&q.minor_units))
            .cloned()
            .collect();
        Rejection {
            removed: quotes.len() - kept.len(),
            kept,
        }
    }
}

impl Default for OutlierRejector {
    fn default() -> Self {
        Self::new(1.5, 4)
    }
}

/// First and third quartiles by the exclusive method.
///
/// Sorted data is split into four equal-weight groups over `n + 1`
/// positions with linear interpolation between neighbours. Needs at
/// least two values.
pub fn quartiles(values: &[i64]) -> Option<(f64, f64)> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mut data: Vec<f64> = values.iter().map(|v| *v as f64).collect();
    data.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let m = n + 1;
    let cut = |i: usize| -> f64 {
        let j = (i * m / 4).clamp(1, n - 1);
        let delta = (i * m) as f64 - (j * 4) as f64;
        (data[j - 1] * (4.0 - delta) + data[j] * delta) / 4.0
    };
    Some((cut(1), cut(3)))
}
