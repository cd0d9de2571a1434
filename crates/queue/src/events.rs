//! Typed queue events.
//!
//! The queue reports progress through a `tokio::sync::broadcast` channel of
//! these payloads instead of an implicit listener registry. Emission is
//! fire-and-forget: zero subscribers is not an error and nothing blocks on
//! delivery.

use serde::Serialize;

use jobscout_core::{JobId, RawJob};

/// How a processed item resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// A new posting was persisted.
    Saved,
    /// The `(url, source)` pair was already persisted.
    Duplicate,
}

/// Observable queue lifecycle events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    /// A batch was appended to the queue.
    JobsAdded { count: usize, source: String },
    /// An item reached `completed` or `duplicate`.
    JobProcessed {
        job: RawJob,
        source: String,
        outcome: ProcessOutcome,
    },
    /// An item exhausted its retry budget.
    JobFailed {
        job: RawJob,
        source: String,
        error: String,
    },
    /// A company aggregate was updated for a persisted posting.
    CompanyProcessed { company: String, job_id: JobId },
    /// The queue drained: nothing queued, nothing in flight.
    ProcessingCompleted,
    /// The drain loop could not start (persistence unreachable). The queue
    /// stays re-enterable; a later add retries.
    ProcessingError { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = QueueEvent::JobsAdded {
            count: 3,
            source: "linkedin".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "jobs_added");
        assert_eq!(json["count"], 3);

        let event = QueueEvent::ProcessingCompleted;
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "processing_completed");
    }

    #[test]
    fn outcome_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ProcessOutcome::Duplicate).unwrap(),
            "duplicate"
        );
    }
}
