//! Store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("conflicting record for key: {0}")]
    Conflict(String),

    #[error("decode error: {0}")]
    Decode(String),
}
