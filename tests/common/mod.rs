//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use priceoracle::config::AppConfig;
use priceoracle::oracle::sources::{HttpClient, HttpSettings, PriceSource, SourceRegistry};
use priceoracle::oracle::PriceOracle;
use priceoracle::types::{ProductDescriptor, RawQuote};
use std::time::Duration;

/// What a stub source does when asked for a quote
#[derive(Clone)]
pub enum Behaviour {
    Quote { price: f64, confidence: f64 },
    Nothing,
    Fail,
    Hang,
    Delayed { millis: u64, price: f64, confidence: f64 },
}

pub struct StubSource {
    pub name: String,
    pub behaviour: Behaviour,
}

impl StubSource {
    pub fn quote(name: &str, price: f64, confidence: f64) -> Self {
        Self {
            name: name.to_string(),
            behaviour: Behaviour::Quote { price, confidence },
        }
    }

    pub fn with(name: &str, behaviour: Behaviour) -> Self {
        Self {
            name: name.to_string(),
            behaviour,
        }
    }
}

#[async_trait]
impl PriceSource for StubSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, _http: &HttpClient, product: &ProductDescriptor) -> anyhow::Result<Option<RawQuote>> {
        match self.behaviour.clone() {
            Behaviour::Quote { price, confidence } => Ok(Some(
                RawQuote::priced(self.name.clone(), product.product_id.clone(), price, confidence).with_shipping(0.0),
            )),
            Behaviour::Nothing => Ok(None),
            Behaviour::Fail => anyhow::bail!("{} is down", self.name),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(None)
            }
            Behaviour::Delayed { millis, price, confidence } => {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(Some(RawQuote::priced(self.name.clone(), product.product_id.clone(), price, confidence)))
            }
        }
    }
}

pub fn http() -> HttpClient {
    HttpClient::new(&HttpSettings::default()).expect("http client")
}

pub fn hoodie() -> ProductDescriptor {
    ProductDescriptor::new("hoodie-1", "Zip Hoodie", "Acme")
}

/// Oracle with default settings and a short per-source timeout
pub fn oracle(registry: SourceRegistry) -> PriceOracle {
    let mut cfg = AppConfig::defaults().expect("default config");
    cfg.oracle.source_timeout_ms = 1_000;
    PriceOracle::from_config(&cfg.oracle, http(), registry)
}
