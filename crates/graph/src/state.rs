//! Transient per-invocation workflow state.

use indexmap::IndexMap;

use jobscout_core::RawJob;

/// Per-source partial results for one graph invocation.
///
/// Created at invocation start, populated by each source step independently,
/// consumed once by aggregation, then discarded. Insertion order is the
/// source-registration order and is preserved through aggregation.
#[derive(Debug, Default)]
pub struct WorkflowState {
    per_source: IndexMap<String, Vec<RawJob>>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one source step's result. Steps never read each other's
    /// output, so a plain insert is all the coordination needed.
    pub fn record(&mut self, source: impl Into<String>, jobs: Vec<RawJob>) {
        self.per_source.insert(source.into(), jobs);
    }

    pub fn per_source(&self) -> &IndexMap<String, Vec<RawJob>> {
        &self.per_source
    }

    /// Flatten every per-source list in insertion order. No dedup here —
    /// that is the ingestion queue's responsibility.
    pub fn aggregate(&self) -> Vec<RawJob> {
        self.per_source.values().flatten().cloned().collect()
    }

    /// Total records across all sources.
    pub fn total(&self) -> usize {
        self.per_source.values().map(Vec::len).sum()
    }

    pub fn into_per_source(self) -> IndexMap<String, Vec<RawJob>> {
        self.per_source
    }
}
