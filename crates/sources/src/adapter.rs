//! Source adapter trait and registry.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::{info, warn};

use jobscout_core::config::SourcesConfig;
use jobscout_core::RawJob;

use crate::error::SourceError;
use crate::http::HttpSource;

/// Trait for job source backends.
///
/// Implementations wrap one external search API. `search` may fail or hang;
/// callers are expected to recover locally (a broken source degrades
/// coverage, never availability).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable source name, also the `source` tag on persisted postings.
    fn name(&self) -> &str;

    /// Query the source for postings matching `keywords`.
    async fn search(&self, keywords: &str) -> Result<Vec<RawJob>, SourceError>;
}

/// Insertion-ordered map of named source adapters.
///
/// Registration order is load-bearing: the orchestration graph aggregates
/// per-source results in this order.
#[derive(Default)]
pub struct SourceRegistry {
    adapters: IndexMap<String, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build HTTP adapters for every configured endpoint.
    pub fn from_config(config: &SourcesConfig) -> Self {
        let mut registry = Self::new();
        for endpoint in &config.endpoints {
            registry.register(Arc::new(HttpSource::new(
                endpoint.name.clone(),
                endpoint.url.clone(),
            )));
        }
        info!(count = registry.len(), "source registry initialized");
        registry
    }

    /// Register an adapter under its own name. A repeated name replaces the
    /// earlier adapter but keeps its registration slot.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        let name = adapter.name().to_string();
        if self.adapters.insert(name.clone(), adapter).is_some() {
            warn!(source = %name, "source adapter replaced");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(name).cloned()
    }

    /// Adapters in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn SourceAdapter>)> {
        self.adapters.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
