//! Source adapters for external job-search APIs.
//!
//! Every provider is reached through the [`SourceAdapter`] trait and looked
//! up in an explicit [`SourceRegistry`] built from static configuration.
//! Provider payloads are loosely typed; adapters normalize them into
//! [`jobscout_core::RawJob`] and callers treat any failure as "this source
//! contributed nothing this round".

pub mod adapter;
pub mod error;
pub mod http;

pub use adapter::{SourceAdapter, SourceRegistry};
pub use error::SourceError;
pub use http::HttpSource;
