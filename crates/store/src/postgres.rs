//! PostgreSQL store.
//!
//! Runtime-checked queries only, so the crate builds without a live
//! database. The `(url, source)` unique index backs the dedup invariant
//! even if two writers race past `find_job`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use jobscout_core::config::PostgresConfig;
use jobscout_core::{CompanyRecord, EnrichmentStatus, JobRecord, NewJob};

use crate::error::StoreError;
use crate::JobStore;

const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        company TEXT NOT NULL,
        location TEXT,
        url TEXT NOT NULL,
        source TEXT NOT NULL,
        description TEXT,
        scraped_at TIMESTAMPTZ NOT NULL,
        UNIQUE (url, source)
    );

    CREATE TABLE IF NOT EXISTS companies (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        name_key TEXT NOT NULL UNIQUE,
        job_posting_ids UUID[] NOT NULL DEFAULT '{}',
        enrichment_status TEXT NOT NULL DEFAULT 'pending'
    );
"#;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool from project config.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!(
            host = %config.host,
            database = %config.database,
            "postgres store connected"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests, shared pools).
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        debug!("postgres schema ensured");
        Ok(())
    }
}

fn query_err(e: sqlx::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    title: String,
    company: String,
    location: Option<String>,
    url: String,
    source: String,
    description: Option<String>,
    scraped_at: DateTime<Utc>,
}

impl From<JobRow> for JobRecord {
    fn from(row: JobRow) -> Self {
        JobRecord {
            id: row.id,
            title: row.title,
            company: row.company,
            location: row.location,
            url: row.url,
            source: row.source,
            description: row.description,
            scraped_at: row.scraped_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CompanyRow {
    id: Uuid,
    name: String,
    job_posting_ids: Vec<Uuid>,
    enrichment_status: String,
}

impl TryFrom<CompanyRow> for CompanyRecord {
    type Error = StoreError;

    fn try_from(row: CompanyRow) -> Result<Self, StoreError> {
        let enrichment_status = EnrichmentStatus::parse_str(&row.enrichment_status)
            .ok_or_else(|| {
                StoreError::Decode(format!("unknown enrichment status: {}", row.enrichment_status))
            })?;
        Ok(CompanyRecord {
            id: row.id,
            name: row.name,
            job_posting_ids: row.job_posting_ids,
            enrichment_status,
        })
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn find_job(&self, url: &str, source: &str) -> Result<Option<JobRecord>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT id, title, company, location, url, source, description, scraped_at \
             FROM jobs WHERE url = $1 AND source = $2",
        )
        .bind(url)
        .bind(source)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(row.map(JobRecord::from))
    }

    async fn insert_job(&self, job: NewJob) -> Result<JobRecord, StoreError> {
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

        sqlx::query(
            "INSERT INTO jobs (id, title, company, location, url, source, description, scraped_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(record.id)
        .bind(&record.title)
        .bind(&record.company)
        .bind(&record.location)
        .bind(&record.url)
        .bind(&record.source)
        .bind(&record.description)
        .bind(record.scraped_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false)
            {
                StoreError::Conflict(format!("{}@{}", record.url, record.source))
            } else {
                query_err(e)
            }
        })?;

        debug!(id = %record.id, url = %record.url, source = %record.source, "job stored");
        Ok(record)
    }

    async fn find_company(&self, name: &str) -> Result<Option<CompanyRecord>, StoreError> {
        let row = sqlx::query_as::<_, CompanyRow>(
            "SELECT id, name, job_posting_ids, enrichment_status \
             FROM companies WHERE name_key = $1",
        )
        .bind(name.to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        row.map(CompanyRecord::try_from).transpose()
    }

    async fn upsert_company(&self, company: CompanyRecord) -> Result<CompanyRecord, StoreError> {
        sqlx::query(
            "INSERT INTO companies (id, name, name_key, job_posting_ids, enrichment_status) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (name_key) DO UPDATE SET \
                 job_posting_ids = EXCLUDED.job_posting_ids, \
                 enrichment_status = EXCLUDED.enrichment_status",
        )
        .bind(company.id)
        .bind(&company.name)
        .bind(company.name.to_lowercase())
        .bind(&company.job_posting_ids)
        .bind(company.enrichment_status.as_str())
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(company)
    }

    async fn ready(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}
