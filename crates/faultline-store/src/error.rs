//! Error types for fault storage

use faultline_record::RecordError;

/// Key-value backend errors
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// Could not reach the backend
    #[error("connection error: {0}")]
    Connection(String),

    /// Backend refused to store a value
    #[error("value for key {key} was not set: {reason}")]
    Rejected { key: String, reason: String },

    /// Flush to durable storage failed
    #[error("data was not saved: {0}")]
    SaveFailed(String),

    /// Any other backend failure
    #[error("backend error: {0}")]
    Backend(String),
}

/// Fault store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record under the requested id
    #[error("fault record not found: {key}")]
    NotFound { key: String },

    /// Underlying set/save failed
    #[error("storage error: {0}")]
    Storage(#[from] KvError),

    /// Persisted payload is not a valid fault record
    #[error("serialization error: {0}")]
    Serialization(#[from] RecordError),
}

impl StoreError {
    /// Check if the record was simply absent
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
