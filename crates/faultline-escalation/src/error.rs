//! Error types for escalation
//!
//! Provides error handling for:
//! - Notification delivery and response validation
//! - Threshold configuration
//! - Policy evaluation over stored records
//! - Queue handoff

use faultline_record::{FaultId, RecordError};
use faultline_store::StoreError;

/// Notification gateway errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Sink answered with something other than `201 Created`
    #[error("unexpected status code: expected {expected}, got {actual}")]
    BadStatusCode { expected: u16, actual: u16 },

    /// Empty or non-JSON response body
    #[error("bad response content: {0}")]
    BadContent(String),

    /// Sink reported the alert in a state other than `open`
    #[error("unexpected alert state: {0}")]
    UnexpectedAlertState(String),

    /// Request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Payload could not be encoded
    #[error("payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl NotifyError {
    /// Check if the sink answered but rejected the notification
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::BadStatusCode { .. } | Self::BadContent(_) | Self::UnexpectedAlertState(_)
        )
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Escalation configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Emergency threshold must exceed the critical one
    #[error(
        "invalid {tier} thresholds: emergency ({emergency}) must exceed critical ({critical})"
    )]
    ThresholdOrder {
        tier: &'static str,
        critical: u64,
        emergency: u64,
    },

    /// Empty severity label for a notification tier
    #[error("empty severity label for {0} tier")]
    EmptyLabel(&'static str),
}

/// Policy evaluation errors
#[derive(Debug, thiserror::Error)]
pub enum EscalationError {
    /// Loading or persisting the record failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Notification was not delivered
    #[error("notification failed: {0}")]
    Notify(#[from] NotifyError),

    /// Stored record carries an exception type with no handler
    #[error("no handler for exception type '{exception_type}' on fault {fault_id}")]
    UnknownSeverity {
        fault_id: FaultId,
        exception_type: String,
    },

    /// Invalid escalation configuration
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Delivered message is not a fault id
    #[error("invalid fault id '{body}': {source}")]
    InvalidId { body: String, source: RecordError },
}

impl EscalationError {
    /// Check if the failure comes from configuration rather than I/O
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnknownSeverity { .. } | Self::Configuration(_))
    }

    /// Check if the record was missing from the store
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_not_found())
    }
}

/// Queue handoff errors
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Receiving side has shut down
    #[error("queue closed: topic {topic}")]
    Closed { topic: String },
}

/// Fault reporting errors
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Record could not be built
    #[error("invalid fault: {0}")]
    Record(#[from] RecordError),

    /// Record could not be persisted
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Id could not be handed off
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}
