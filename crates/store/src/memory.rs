//! In-memory store backed by `RwLock`-guarded maps.
//!
//! Jobs are keyed by `(url, source)`, companies by lowercased name so
//! "Acme" and "acme" aggregate to one record. Used by tests and by local
//! runs where PostgreSQL is not configured.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use jobscout_core::{CompanyRecord, JobRecord, NewJob};

use crate::error::StoreError;
use crate::JobStore;

#[derive(Default)]
pub struct MemoryStore {
    jobs: Arc<RwLock<HashMap<(String, String), JobRecord>>>,
    companies: Arc<RwLock<HashMap<String, CompanyRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted postings.
    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Number of company aggregates.
    pub async fn company_count(&self) -> usize {
        self.companies.read().await.len()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn find_job(&self, url: &str, source: &str) -> Result<Option<JobRecord>, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(&(url.to_string(), source.to_string())).cloned())
    }

    async fn insert_job(&self, job: NewJob) -> Result<JobRecord, StoreError> {
        let key = (job.url.clone(), job.source.clone());
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&key) {
            return Err(StoreError::Conflict(format!("{}@{}", key.0, key.1)));
        }
        let record = JobRecord {
            id: Uuid::new_v4(),
            title: job.title,
            company: job.company,
            location: job.location,
            url: job.url,
            source: job.source,
            description: job.description,
            scraped_at: Utc::now(),
        };
        jobs.insert(key, record.clone());
        debug!(id = %record.id, url = %record.url, source = %record.source, "job stored");
        Ok(record)
    }

    async fn find_company(&self, name: &str) -> Result<Option<CompanyRecord>, StoreError> {
        let companies = self.companies.read().await;
        Ok(companies.get(&name.to_lowercase()).cloned())
    }

    async fn upsert_company(&self, company: CompanyRecord) -> Result<CompanyRecord, StoreError> {
        let mut companies = self.companies.write().await;
        companies.insert(company.name.to_lowercase(), company.clone());
        Ok(company)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobscout_core::EnrichmentStatus;

    fn make_job(url: &str, source: &str) -> NewJob {
        NewJob {
            title: "Engineer".to_string(),
            company: "Acme".to_string(),
            location: None,
            url: url.to_string(),
            source: source.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn insert_then_find() {
        let store = MemoryStore::new();
        let record = store.insert_job(make_job("u1", "linkedin")).await.unwrap();
        let found = store.find_job("u1", "linkedin").await.unwrap().unwrap();
        assert_eq!(found.id, record.id);
        assert_eq!(store.job_count().await, 1);
    }

    #[tokio::test]
    async fn same_url_different_source_is_distinct() {
        let store = MemoryStore::new();
        store.insert_job(make_job("u1", "linkedin")).await.unwrap();
        store.insert_job(make_job("u1", "indeed")).await.unwrap();
        assert_eq!(store.job_count().await, 2);
    }

    #[tokio::test]
    async fn second_insert_for_key_conflicts() {
        let store = MemoryStore::new();
        store.insert_job(make_job("u1", "linkedin")).await.unwrap();
        let err = store.insert_job(make_job("u1", "linkedin")).await;
        assert!(matches!(err, Err(StoreError::Conflict(_))));
        assert_eq!(store.job_count().await, 1);
    }

    #[tokio::test]
    async fn company_lookup_is_case_insensitive() {
        let store = MemoryStore::new();
        let company = CompanyRecord {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            job_posting_ids: vec![Uuid::new_v4()],
            enrichment_status: EnrichmentStatus::Pending,
        };
        store.upsert_company(company.clone()).await.unwrap();
        let found = store.find_company("ACME").await.unwrap().unwrap();
        assert_eq!(found.id, company.id);
        assert_eq!(store.company_count().await, 1);
    }
}
