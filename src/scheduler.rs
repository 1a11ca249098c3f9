//! Periodic re-pricing of the product catalog

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::pricing::PricingService;
use crate::types::ProductDescriptor;

/// Counts from one pass over the catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub priced: usize,
    pub failed: usize,
}

pub struct PriceScheduler {
    service: Arc<PricingService>,
    products: Vec<ProductDescriptor>,
    interval: Duration,
}

impl PriceScheduler {
    pub fn new(service: Arc<PricingService>, products: Vec<ProductDescriptor>, interval: Duration) -> Self {
        Self {
            service,
            products,
            interval,
        }
    }

    /// Price every active product once, sequentially
    pub async fn run_once(&self) -> RunSummary {
        let run_id = uuid::Uuid::new_v4();
        let mut summary = RunSummary::default();
        for product in self.products.iter().filter(|p| p.active) {
            match self.service.compute(product).await {
                Ok(_) => summary.priced += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(run_id = %run_id, product_id = %product.product_id, error = %e, "Scheduled pricing failed");
                }
            }
        }
        tracing::info!(run_id = %run_id, priced = summary.priced, failed = summary.failed, "Scheduled pass complete");
        self.service.broadcaster().broadcast_heartbeat();
        summary
    }

    /// Run passes on every tick until `shutdown` flips to true or its sender is dropped
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            products = self.products.len(),
            interval_secs = self.interval.as_secs(),
            "Price scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Price scheduler stopped");
    }
}
