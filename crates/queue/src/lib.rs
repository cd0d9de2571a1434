//! Ingestion queue for discovered job postings.
//!
//! [`IngestQueue`] accepts batches of raw records, deduplicates them against
//! the persistence boundary, persists new ones under a concurrency cap, and
//! retries failures with linear backoff. Successful persistence triggers the
//! [`CompanyAggregator`] as a non-fatal side effect. Progress is observable
//! through a typed broadcast event stream.

pub mod company;
pub mod events;
pub mod ingest;
pub mod item;

pub use company::CompanyAggregator;
pub use events::{ProcessOutcome, QueueEvent};
pub use ingest::{IngestQueue, QueueConfig, QueueStats};
pub use item::QueueItem;
