use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of a persisted job posting.
pub type JobId = Uuid;

/// Unique identifier of a company record.
pub type CompanyId = Uuid;

/// A loosely-typed job record as returned by a source adapter.
///
/// Source APIs disagree on field names and coverage, so everything beyond
/// title/company/url is optional. Adapters normalize into this shape before
/// anything downstream sees the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawJob {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: Option<String>,
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Lifecycle of a queued job on its way to persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Duplicate,
    Completed,
    Retry,
    Failed,
}

impl JobStatus {
    /// Whether the status is terminal — the item will not transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Duplicate | JobStatus::Completed | JobStatus::Failed
        )
    }
}

/// A persisted job posting. `(url, source)` identifies at most one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub url: String,
    pub source: String,
    pub description: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// A job posting ready to persist. The store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub url: String,
    pub source: String,
    pub description: Option<String>,
}

impl NewJob {
    /// Tag a raw record with the source it came from.
    pub fn from_raw(raw: RawJob, source: &str) -> Self {
        Self {
            title: raw.title,
            company: raw.company,
            location: raw.location,
            url: raw.url,
            source: source.to_string(),
            description: raw.description,
        }
    }
}

/// Progress of supplementary company data collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Pending,
    Enriched,
    Failed,
}

impl EnrichmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentStatus::Pending => "pending",
            EnrichmentStatus::Enriched => "enriched",
            EnrichmentStatus::Failed => "failed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EnrichmentStatus::Pending),
            "enriched" => Some(EnrichmentStatus::Enriched),
            "failed" => Some(EnrichmentStatus::Failed),
            _ => None,
        }
    }
}

/// Per-company aggregation of persisted postings, upserted by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub id: CompanyId,
    pub name: String,
    /// Ids of persisted postings attributed to this company. No duplicates.
    pub job_posting_ids: Vec<JobId>,
    pub enrichment_status: EnrichmentStatus,
}
