//! Queue item bookkeeping.

use chrono::{DateTime, Utc};

use jobscout_core::{JobStatus, RawJob};

/// A raw record wrapped with queue-only bookkeeping.
///
/// Owned exclusively by the queue until a terminal status. The `attempts`
/// counter only counts failed persistence attempts and never exceeds the
/// configured retry budget.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub job: RawJob,
    pub source: String,
    pub attempts: u32,
    pub status: JobStatus,
    pub added_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(job: RawJob, source: &str) -> Self {
        Self {
            job,
            source: source.to_string(),
            attempts: 0,
            status: JobStatus::Pending,
            added_at: Utc::now(),
        }
    }
}
