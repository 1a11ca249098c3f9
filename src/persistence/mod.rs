//! CSV Persistence Module
//!
//! Append-only storage of computed prices and the quotes behind them, for
//! price history queries and auditing

use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock as AsyncRwLock;
use tracing::info;

use crate::oracle::{Clock, SystemClock};
use crate::types::{AggregationResult, NormalizedQuote};

/// Separator for source lists inside one CSV cell
const LIST_SEPARATOR: &str = ";";

/// Computed price record for CSV storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub timestamp: i64,
    pub product_id: String,
    pub lowest_minor: i64,
    pub display_minor: i64,
    pub margin_percent: f64,
    /// `;`-joined supporting source ids
    pub supporting_sources: String,
    /// `;`-joined ids of every quote that passed the confidence gate
    pub all_sources: String,
    pub sources_count: usize,
    pub outliers_removed: usize,
    /// True when the price came from the last known value, not a fresh run
    pub from_fallback: bool,
    #[serde(default)]
    pub tx_id: Option<String>,
}

impl PriceRecord {
    pub fn supporting(&self) -> Vec<&str> {
        split_list(&self.supporting_sources)
    }

    pub fn all(&self) -> Vec<&str> {
        split_list(&self.all_sources)
    }
}

/// One gated quote, kept for audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub timestamp: i64,
    pub product_id: String,
    pub source_id: String,
    pub minor_units: i64,
    pub confidence: f64,
    /// Major-unit price as reported, before shipping
    pub unit_price: String,
    pub shipping: String,
    #[serde(default)]
    pub observed_at: Option<i64>,
}

impl QuoteRecord {
    pub fn from_quote(timestamp: i64, quote: &NormalizedQuote) -> Self {
        Self {
            timestamp,
            product_id: quote.product_id.clone(),
            source_id: quote.source_id.clone(),
            minor_units: quote.minor_units,
            confidence: quote.confidence,
            unit_price: quote.raw.unit_price.to_string(),
            shipping: quote.raw.shipping.to_string(),
            observed_at: quote.raw.observed_at.map(|t| t.timestamp_millis()),
        }
    }
}

pub fn join_list<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    items
        .into_iter()
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

fn split_list(cell: &str) -> Vec<&str> {
    cell.split(LIST_SEPARATOR).filter(|s| !s.is_empty()).collect()
}

/// Append handle for one kind of daily file, reopened when the date changes
struct DailyWriter {
    dir: PathBuf,
    kind: &'static str,
    open: Option<(NaiveDate, csv::Writer<std::fs::File>)>,
}

impl DailyWriter {
    fn new(dir: PathBuf, kind: &'static str) -> Self {
        Self {
            dir,
            kind,
            open: None,
        }
    }

    fn for_date(&mut self, date: NaiveDate) -> Result<&mut csv::Writer<std::fs::File>> {
        let stale = !matches!(&self.open, Some((current, _)) if *current == date);
        if stale {
            if let Some((previous, mut writer)) = self.open.take() {
                writer.flush().context("Failed to flush CSV writer")?;
                info!(kind = self.kind, from = %previous, to = %date, "Rolling over daily CSV file");
            }
            let filename = format!("{}_{}.csv", self.kind, date.format("%Y-%m-%d"));
            let writer = CsvPersistence::create_writer(&self.dir, &filename)?;
            self.open = Some((date, writer));
        }
        match &mut self.open {
            Some((_, writer)) => Ok(writer),
            None => anyhow::bail!("{} writer not open", self.kind),
        }
    }
}

/// CSV persistence manager
pub struct CsvPersistence {
    data_dir: PathBuf,
    clock: Arc<dyn Clock>,
    price_writer: Arc<AsyncRwLock<DailyWriter>>,
    quote_writer: Arc<AsyncRwLock<DailyWriter>>,
}

impl CsvPersistence {
    /// Create a new persistence manager
    pub fn new(data_dir: &str) -> Result<Self> {
        let data_dir = PathBuf::from(data_dir);

        // Create directory if it doesn't exist
        fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
        fs::create_dir_all(data_dir.join("prices"))?;
        fs::create_dir_all(data_dir.join("quotes"))?;

        info!(dir = %data_dir.display(), "CSV persistence ready");

        Ok(Self {
            price_writer: Arc::new(AsyncRwLock::new(DailyWriter::new(data_dir.join("prices"), "prices"))),
            quote_writer: Arc::new(AsyncRwLock::new(DailyWriter::new(data_dir.join("quotes"), "quotes"))),
            clock: Arc::new(SystemClock),
            data_dir,
        })
    }

    /// Replace the time source that picks the daily file
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    fn create_writer(dir: &Path, filename: &str) -> Result<csv::Writer<std::fs::File>> {
        let path = dir.join(filename);
        let file_has_data =
            path.exists() && fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to open CSV file")?;

        let writer = WriterBuilder::new()
            .has_headers(!file_has_data)
            .from_writer(file);

        Ok(writer)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Save a computed price
    pub async fn save_price(&self, record: PriceRecord) -> Result<()> {
        let today = self.today();
        let mut daily = self.price_writer.write().await;
        let writer = daily.for_date(today)?;
        writer
            .serialize(&record)
            .context("Failed to write price record")?;
        writer.flush().context("Failed to flush price writer")?;
        Ok(())
    }

    /// Save every gated quote of an aggregation run
    pub async fn save_quotes(&self, result: &AggregationResult) -> Result<()> {
        let timestamp = result.computed_at.timestamp_millis();
        let today = self.today();
        let mut daily = self.quote_writer.write().await;
        let writer = daily.for_date(today)?;
        for quote in &result.all_quotes {
            writer
                .serialize(QuoteRecord::from_quote(timestamp, quote))
                .context("Failed to write quote record")?;
        }
        writer.flush().context("Failed to flush quote writer")?;
        Ok(())
    }

    /// Load price history for a product from the last `days` daily files
    pub fn load_price_history(&self, product_id: &str, days: u32) -> Result<Vec<PriceRecord>> {
        self.load_daily("prices", days, |r: &PriceRecord| r.product_id == product_id)
    }

    /// Load audited quotes for a product from the last `days` daily files
    pub fn load_quote_history(&self, product_id: &str, days: u32) -> Result<Vec<QuoteRecord>> {
        self.load_daily("quotes", days, |r: &QuoteRecord| r.product_id == product_id)
    }

    fn load_daily<T, F>(&self, kind: &str, days: u32, keep: F) -> Result<Vec<T>>
    where
        T: for<'de> Deserialize<'de> + HasTimestamp,
        F: Fn(&T) -> bool,
    {
        let mut records = Vec::new();
        let today = self.today();

        for i in 0..days {
            let date = today - chrono::Duration::days(i as i64);
            let filename = format!("{}_{}.csv", kind, date.format("%Y-%m-%d"));
            let path = self.data_dir.join(kind).join(&filename);

            if path.exists() {
                let file = std::fs::File::open(&path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

                for result in reader.deserialize() {
                    let record: T = result
                        .with_context(|| format!("Failed to deserialize {} record", kind))?;
                    if keep(&record) {
                        records.push(record);
                    }
                }
            }
        }

        // Sort by timestamp
        records.sort_by_key(|r| r.timestamp());

        Ok(records)
    }
}

pub trait HasTimestamp {
    fn timestamp(&self) -> i64;
}

impl HasTimestamp for PriceRecord {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl HasTimestamp for QuoteRecord {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceQuote;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn set(&self, now: DateTime<Utc>) {
            *self.0.lock().unwrap() = now;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn temp_data_dir(test_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "priceoracle_persistence_{}_{}",
            test_name,
            uuid::Uuid::new_v4()
        ))
    }

    fn price(product_id: &str, timestamp: i64, lowest: i64) -> PriceRecord {
        PriceRecord {
            timestamp,
            product_id: product_id.to_string(),
            lowest_minor: lowest,
            display_minor: lowest * 97 / 100,
            margin_percent: 3.0,
            supporting_sources: join_list(["amazon", "flipkart"]),
            all_sources: join_list(["amazon", "flipkart", "myntra"]),
            sources_count: 3,
            outliers_removed: 0,
            from_fallback: false,
            tx_id: None,
        }
    }

    #[tokio::test]
    async fn price_history_filters_and_sorts() {
        let data_dir = temp_data_dir("history");
        let persistence = CsvPersistence::new(data_dir.to_str().unwrap()).unwrap();

        persistence.save_price(price("p1", 20, 2_000)).await.unwrap();
        persistence.save_price(price("p2", 15, 500)).await.unwrap();
        persistence.save_price(price("p1", 10, 1_900)).await.unwrap();

        let history = persistence.load_price_history("p1", 1).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].timestamp, 10);
        assert_eq!(history[1].lowest_minor, 2_000);
        assert_eq!(history[1].supporting(), vec!["amazon", "flipkart"]);
        assert_eq!(history[1].all().len(), 3);

        fs::remove_dir_all(&data_dir).ok();
    }

    #[tokio::test]
    async fn reopening_appends_without_duplicate_headers() {
        let data_dir = temp_data_dir("reopen");
        {
            let persistence = CsvPersistence::new(data_dir.to_str().unwrap()).unwrap();
            persistence.save_price(price("p1", 1, 100)).await.unwrap();
        }
        let persistence = CsvPersistence::new(data_dir.to_str().unwrap()).unwrap();
        persistence.save_price(price("p1", 2, 200)).await.unwrap();

        let history = persistence.load_price_history("p1", 1).unwrap();
        assert_eq!(history.len(), 2);

        fs::remove_dir_all(&data_dir).ok();
    }

    #[tokio::test]
    async fn writes_roll_over_at_midnight() {
        let data_dir = temp_data_dir("rollover");
        let clock = Arc::new(ManualClock(Mutex::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 0).unwrap(),
        )));
        let persistence = CsvPersistence::new(data_dir.to_str().unwrap())
            .unwrap()
            .with_clock(clock.clone());

        persistence.save_price(price("p1", 1, 100)).await.unwrap();
        clock.set(Utc.with_ymd_and_hms(2026, 3, 2, 0, 1, 0).unwrap());
        persistence.save_price(price("p1", 2, 200)).await.unwrap();

        let prices = data_dir.join("prices");
        assert!(prices.join("prices_2026-03-01.csv").exists());
        assert!(prices.join("prices_2026-03-02.csv").exists());

        let today = persistence.load_price_history("p1", 1).unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].lowest_minor, 200);

        let both = persistence.load_price_history("p1", 2).unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(both[0].lowest_minor, 100);

        fs::remove_dir_all(&data_dir).ok();
    }

    #[tokio::test]
    async fn quotes_are_audited_per_run() {
        let data_dir = temp_data_dir("quotes");
        let persistence = CsvPersistence::new(data_dir.to_str().unwrap()).unwrap();

        let quote = NormalizedQuote {
            source_id: "amazon".to_string(),
            product_id: "p1".to_string(),
            minor_units: 129_900,
            confidence: 0.93,
            raw: SourceQuote {
                source_id: "amazon".to_string(),
                product_id: "p1".to_string(),
                unit_price: Decimal::new(129_900, 2),
                shipping: Decimal::ZERO,
                confidence: 0.93,
                observed_at: None,
            },
        };
        let result = AggregationResult {
            product_id: "p1".to_string(),
            final_price_minor: 129_900,
            absolute_min_minor: 129_900,
            weighted_avg_minor: 129_900,
            supporting_sources: BTreeSet::from(["amazon".to_string()]),
            all_quotes: vec![quote],
            sources_count: 1,
            outliers_removed_count: 0,
            computed_at: Utc::now(),
        };

        persistence.save_quotes(&result).await.unwrap();
        let audited = persistence.load_quote_history("p1", 1).unwrap();
        assert_eq!(audited.len(), 1);
        assert_eq!(audited[0].source_id, "amazon");
        assert_eq!(audited[0].unit_price, "1299.00");

        fs::remove_dir_all(&data_dir).ok();
    }
}
