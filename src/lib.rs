//! PriceOracle Library
//!
//! Multi-source product price aggregation with confidence-weighted,
//! outlier-resistant consensus pricing

pub mod broadcast;
pub mod config;
pub mod oracle;
pub mod persistence;
pub mod pricing;
pub mod scheduler;
pub mod types;
