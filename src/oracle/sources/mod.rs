//! Price source implementations (search APIs, product pages, fallback chains)

mod extract;
mod fallback;
mod http;
mod product_page;
mod search_api;

pub use extract::{first_number, pick_price, price_from_json, rupee_candidates};
pub use fallback::FallbackSource;
pub use http::{HttpClient, HttpSettings};
pub use product_page::ProductPageSource;
pub use search_api::SearchApiSource;

use crate::config::{SourceConfig, SourceKind};
use crate::types::{ProductDescriptor, RawQuote};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for price source adapters
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Stable source identifier, used as `source_id` on every quote
    fn name(&self) -> &str;

    /// Look up one product.
    ///
    /// `Ok(None)` means the source had nothing for this product; errors are
    /// logged by the fetcher and treated the same way.
    async fn fetch(
        &self,
        http: &HttpClient,
        product: &ProductDescriptor,
    ) -> Result<Option<RawQuote>>;
}

/// Ordered set of sources queried for every product
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn PriceSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: Arc<dyn PriceSource>) {
        self.sources.push(source);
    }

    pub fn with(mut self, source: impl PriceSource + 'static) -> Self {
        self.register(Arc::new(source));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn PriceSource>> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Build the registry from configuration.
    ///
    /// Enabled entries sharing a name become one fallback chain, tried in
    /// declaration order. Registration order follows each name's first
    /// appearance.
    pub fn from_config(configs: &[SourceConfig]) -> Result<Self> {
        let mut groups: Vec<(String, Vec<Arc<dyn PriceSource>>)> = Vec::new();

        for cfg in configs.iter().filter(|c| c.enabled) {
            let source = build_source(cfg)?;
            match groups.iter_mut().find(|(name, _)| *name == cfg.name) {
                Some((_, chain)) => chain.push(source),
                None => groups.push((cfg.name.clone(), vec![source])),
            }
        }

        let mut registry = Self::new();
        for (name, mut chain) in groups {
            if chain.len() == 1 {
                registry.register(chain.remove(0));
            } else {
                tracing::debug!(source = %name, steps = chain.len(), "Registering fallback chain");
                registry.register(Arc::new(FallbackSource::new(name, chain)));
            }
        }

        tracing::info!(sources = ?registry.names(), "Price sources registered");
        Ok(registry)
    }
}

fn build_source(cfg: &SourceConfig) -> Result<Arc<dyn PriceSource>> {
    let source: Arc<dyn PriceSource> = match cfg.kind {
        SourceKind::SearchApi => {
            let mut source = SearchApiSource::new(&cfg.name, cfg.confidence);
            if let Some(host) = cfg.resolved_host() {
                source = source.with_host(host);
            }
            if let Some(path) = cfg.path.as_deref() {
                source = source.with_path(path);
            }
            if let Some(key) = cfg.api_key() {
                source = source.with_api_key(key);
            }
            if let Some(country) = cfg.country.as_deref() {
                source = source.with_country(country);
            }
            Arc::new(source)
        }
        SourceKind::ProductPage => {
            let mut source =
                ProductPageSource::new(&cfg.name, cfg.confidence, cfg.untagged_confidence);
            if let Some(template) = cfg.search_url.as_deref() {
                source = source.with_search_url(template);
            }
            if let Some(pattern) = cfg.price_pattern.as_deref() {
                source = source.with_price_pattern(pattern)?;
            }
            Arc::new(source)
        }
    };
    Ok(source)
}
