//! Error types for fault records

/// Errors that can occur when building, parsing or decoding fault records
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Invalid id length
    #[error("invalid fault id length: expected {expected}, got {actual}")]
    InvalidIdLength { expected: usize, actual: usize },

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Origin entity uuid is not a canonical uuid
    #[error("invalid entity uuid: {0}")]
    InvalidUuid(#[from] uuid::Error),

    /// Exception type has no severity tier
    #[error("unknown exception type: {0:?}")]
    UnknownSeverity(String),

    /// Decoded record breaks a record invariant
    #[error("invalid record data: {0}")]
    InvalidData(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RecordError {
    /// Check if error came from decoding a persisted payload
    #[inline]
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Serialization(_) | Self::InvalidData(_))
    }
}
