//! Price update broadcaster
//!
//! Fans computed prices out to every live subscriber as JSON lines.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Submission state of the two on-chain writes for one price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStatus {
    pub lowest_tx_id: Option<String>,
    pub display_tx_id: Option<String>,
    pub lowest_confirmed: bool,
    pub display_confirmed: bool,
}

/// Newly computed price for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub product_id: String,
    pub lowest_minor: i64,
    pub display_minor: i64,
    pub display_price_readable: String,
    pub margin_percent: f64,
    pub chain: ChainStatus,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BroadcastMessage {
    PriceUpdate(PriceUpdate),
    /// Keep-alive (unix millis)
    Heartbeat(i64),
}

/// Channel for broadcasting updates to subscribers
#[derive(Debug, Clone)]
pub struct PriceBroadcaster {
    tx: broadcast::Sender<String>,
}

impl PriceBroadcaster {
    /// Create a new broadcaster with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to receive broadcast messages
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Broadcast a message to all subscribers
    pub fn broadcast(&self, msg: &BroadcastMessage) {
        if let Ok(json) = serde_json::to_string(msg) {
            // Ignore send errors (no receivers is fine)
            let _ = self.tx.send(json);
        }
    }

    pub fn broadcast_price(&self, update: PriceUpdate) {
        self.broadcast(&BroadcastMessage::PriceUpdate(update));
    }

    pub fn broadcast_heartbeat(&self) {
        self.broadcast(&BroadcastMessage::Heartbeat(chrono::Utc::now().timestamp_millis()));
    }
}

impl Default for PriceBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Wait for the next price update for `product_id`, skipping everything else.
///
/// Returns `None` once the channel is closed.
pub async fn next_update_for(
    rx: &mut broadcast::Receiver<String>,
    product_id: &str,
) -> Option<PriceUpdate> {
    loop {
        let json = match rx.recv().await {
            Ok(json) => json,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Subscriber lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        };
        if let Ok(BroadcastMessage::PriceUpdate(update)) = serde_json::from_str(&json) {
            if update.product_id == product_id {
                return Some(update);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(product_id: &str, lowest: i64) -> PriceUpdate {
        PriceUpdate {
            product_id: product_id.to_string(),
            lowest_minor: lowest,
            display_minor: lowest * 97 / 100,
            display_price_readable: String::new(),
            margin_percent: 3.0,
            chain: ChainStatus {
                lowest_tx_id: None,
                display_tx_id: None,
                lowest_confirmed: false,
                display_confirmed: false,
            },
            timestamp: 0,
        }
    }

    #[test]
    fn no_receivers_is_not_an_error() {
        let broadcaster = PriceBroadcaster::new(4);
        assert_eq!(broadcaster.receiver_count(), 0);
        broadcaster.broadcast_price(update("p1", 100));
    }

    #[tokio::test]
    async fn subscribers_filter_by_product() {
        let broadcaster = PriceBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();

        broadcaster.broadcast_heartbeat();
        broadcaster.broadcast_price(update("other", 1));
        broadcaster.broadcast_price(update("p1", 2_000));

        let got = next_update_for(&mut rx, "p1").await.unwrap();
        assert_eq!(got.lowest_minor, 2_000);
        assert_eq!(got.display_minor, 1_940);
    }

    #[test]
    fn messages_are_tagged_json() {
        let json = serde_json::to_string(&BroadcastMessage::Heartbeat(5)).unwrap();
        assert_eq!(json, r#"{"type":"heartbeat","data":5}"#);
    }
}
