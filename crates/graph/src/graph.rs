//! Fan-out/fan-in search execution.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use indexmap::IndexMap;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use jobscout_core::RawJob;
use jobscout_sources::{SourceAdapter, SourceRegistry};

use crate::state::WorkflowState;

/// Default per-source step timeout.
const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for graph execution.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// How long one source step may run before it is treated as failed.
    pub step_timeout: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }
}

/// A search request as submitted by the outer request layer.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub keywords: String,
}

/// The aggregated result of one graph invocation.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Every source's records flattened in registration order.
    pub all_jobs: Vec<RawJob>,
    /// Per-source partial results, registration-ordered. Failed sources
    /// appear with an empty list.
    pub per_source: IndexMap<String, Vec<RawJob>>,
}

/// Two-level fan-out/fan-in over the registered source adapters.
///
/// `start → {source_1 … source_N} → aggregate → done`. Source steps run
/// concurrently and independently; aggregation is the only step with a
/// dependency (on all of them). There is no retry of the graph itself.
pub struct SearchGraph {
    sources: Vec<(String, Arc<dyn SourceAdapter>)>,
    config: GraphConfig,
}

impl SearchGraph {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            sources: Vec::new(),
            config,
        }
    }

    /// Build a graph with one step per registry entry, in registry order.
    pub fn from_registry(registry: &SourceRegistry, config: GraphConfig) -> Self {
        let mut graph = Self::new(config);
        for (name, adapter) in registry.iter() {
            graph.register(name, adapter.clone());
        }
        graph
    }

    /// Append a source step. Registration order fixes aggregation order.
    pub fn register(&mut self, name: impl Into<String>, adapter: Arc<dyn SourceAdapter>) {
        self.sources.push((name.into(), adapter));
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Run the graph for one request.
    ///
    /// Never fails: adapter errors and timeouts are converted locally into
    /// empty partial lists so one broken source cannot abort its siblings
    /// or the aggregation step.
    pub async fn invoke(&self, request: &SearchRequest) -> SearchOutcome {
        debug!(keywords = %request.keywords, sources = self.sources.len(), "search graph invoked");

        let steps = self
            .sources
            .iter()
            .map(|(name, adapter)| self.run_step(name, adapter, &request.keywords));
        let results = join_all(steps).await;

        let mut state = WorkflowState::new();
        for (name, jobs) in results {
            state.record(name, jobs);
        }

        let all_jobs = state.aggregate();
        info!(
            keywords = %request.keywords,
            total = all_jobs.len(),
            "search graph done"
        );
        SearchOutcome {
            all_jobs,
            per_source: state.into_per_source(),
        }
    }

    async fn run_step(
        &self,
        name: &str,
        adapter: &Arc<dyn SourceAdapter>,
        keywords: &str,
    ) -> (String, Vec<RawJob>) {
        match timeout(self.config.step_timeout, adapter.search(keywords)).await {
            Ok(Ok(jobs)) => {
                debug!(source = %name, count = jobs.len(), "source step resolved");
                (name.to_string(), jobs)
            }
            Ok(Err(e)) => {
                warn!(source = %name, error = %e, "source step failed, continuing without it");
                (name.to_string(), Vec::new())
            }
            Err(_) => {
                warn!(
                    source = %name,
                    timeout_secs = self.config.step_timeout.as_secs(),
                    "source step timed out, continuing without it"
                );
                (name.to_string(), Vec::new())
            }
        }
    }
}
