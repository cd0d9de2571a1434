//! Per-company aggregation of persisted postings.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use jobscout_core::{CompanyRecord, EnrichmentStatus, JobId};
use jobscout_store::{JobStore, StoreError};

/// Upserts company aggregates as postings are persisted.
///
/// Runs as a side effect of successful job persistence and is never allowed
/// to fail the persistence path: the queue logs and drops any error coming
/// out of here.
pub struct CompanyAggregator {
    store: Arc<dyn JobStore>,
}

impl CompanyAggregator {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Attribute a persisted posting to its company.
    ///
    /// Creates the company with `enrichment_status = pending` on first
    /// sight; appends the posting id otherwise. Re-recording the same
    /// `(name, job_id)` pair is a no-op append, so the call is idempotent.
    pub async fn record_posting(
        &self,
        name: &str,
        job_id: JobId,
    ) -> Result<CompanyRecord, StoreError> {
        let company = match self.store.find_company(name).await? {
            Some(mut existing) => {
                if !existing.job_posting_ids.contains(&job_id) {
                    existing.job_posting_ids.push(job_id);
                }
                existing
            }
            None => CompanyRecord {
                id: Uuid::new_v4(),
                name: name.to_string(),
                job_posting_ids: vec![job_id],
                enrichment_status: EnrichmentStatus::Pending,
            },
        };

        let saved = self.store.upsert_company(company).await?;
        debug!(
            company = %saved.name,
            %job_id,
            postings = saved.job_posting_ids.len(),
            "company aggregated"
        );
        Ok(saved)
    }
}
