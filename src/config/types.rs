//! Source definitions from the `sources` config section

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// JSON product-search API
    SearchApi,
    /// Scraped retailer page
    ProductPage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source id; entries sharing a name form a fallback chain
    pub name: String,
    pub kind: SourceKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// API host or base URL
    #[serde(default)]
    pub host: Option<String>,
    /// Environment variable holding the host, consulted when `host` is unset
    #[serde(default)]
    pub host_env: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Page search template with a `{query}` placeholder
    #[serde(default)]
    pub search_url: Option<String>,
    /// Regex whose first group captures the price on a page
    #[serde(default)]
    pub price_pattern: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_untagged_confidence")]
    pub untagged_confidence: f64,
}

fn default_enabled() -> bool {
    true
}

fn default_confidence() -> f64 {
    0.92
}

fn default_untagged_confidence() -> f64 {
    0.65
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: true,
            host: None,
            host_env: None,
            path: None,
            api_key_env: None,
            country: None,
            search_url: None,
            price_pattern: None,
            confidence: default_confidence(),
            untagged_confidence: default_untagged_confidence(),
        }
    }

    /// Host from config, else from the named environment variable
    pub fn resolved_host(&self) -> Option<String> {
        self.host
            .clone()
            .or_else(|| read_env(self.host_env.as_deref()))
    }

    /// API key from the named environment variable
    pub fn api_key(&self) -> Option<String> {
        read_env(self.api_key_env.as_deref())
    }
}

fn read_env(var: Option<&str>) -> Option<String> {
    let value = std::env::var(var?).ok()?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
