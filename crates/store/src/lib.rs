//! Persistence boundary for job postings and company aggregates.
//!
//! The queue and aggregator only ever talk to [`JobStore`]; backends decide
//! where the data lives. [`MemoryStore`] covers tests and store-less local
//! runs, [`PgStore`] maps the same contract onto PostgreSQL.

pub mod error;
pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use jobscout_core::{CompanyRecord, JobRecord, NewJob};

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Trait for job persistence backends.
///
/// `(url, source)` is the identity of a posting: `find_job` before
/// `insert_job` is how the queue deduplicates. No transactional guarantee
/// spans a job insert and the company upsert that follows it.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Look up a persisted posting by its `(url, source)` identity.
    async fn find_job(&self, url: &str, source: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Persist a new posting, assigning id and scrape timestamp.
    async fn insert_job(&self, job: NewJob) -> Result<JobRecord, StoreError>;

    /// Look up a company aggregate by name (case-insensitive).
    async fn find_company(&self, name: &str) -> Result<Option<CompanyRecord>, StoreError>;

    /// Create or replace a company aggregate, keyed by name.
    async fn upsert_company(&self, company: CompanyRecord) -> Result<CompanyRecord, StoreError>;

    /// Probe backend reachability before a drain begins.
    async fn ready(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Blanket implementation so `Arc<dyn JobStore>` can be used directly.
#[async_trait]
impl<T: JobStore + ?Sized> JobStore for Arc<T> {
    async fn find_job(&self, url: &str, source: &str) -> Result<Option<JobRecord>, StoreError> {
        (**self).find_job(url, source).await
    }

    async fn insert_job(&self, job: NewJob) -> Result<JobRecord, StoreError> {
        (**self).insert_job(job).await
    }

    async fn find_company(&self, name: &str) -> Result<Option<CompanyRecord>, StoreError> {
        (**self).find_company(name).await
    }

    async fn upsert_company(&self, company: CompanyRecord) -> Result<CompanyRecord, StoreError> {
        (**self).upsert_company(company).await
    }

    async fn ready(&self) -> Result<(), StoreError> {
        (**self).ready().await
    }
}
