//! The fault record entity
//!
//! A [`FaultRecord`] is the durable state of one deduplicated fault signature.
//! Descriptive fields are fixed at creation. Counters and timestamps only move
//! through the value-returning transitions [`FaultRecord::increment`] and
//! [`FaultRecord::mark_processed`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::RecordError;
use crate::id::FaultId;
use crate::severity::FaultSeverity;

/// Notification status of a fault record
///
/// Persisted as `0` (new) and `1` (processed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum FaultStatus {
    /// No notification delivered for the current occurrence
    #[default]
    New,
    /// A notification has been delivered
    Processed,
}

impl From<FaultStatus> for u8 {
    fn from(status: FaultStatus) -> Self {
        match status {
            FaultStatus::New => 0,
            FaultStatus::Processed => 1,
        }
    }
}

impl TryFrom<u8> for FaultStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FaultStatus::New),
            1 => Ok(FaultStatus::Processed),
            other => Err(format!("unknown fault status {other}")),
        }
    }
}

/// One deduplicated fault signature with its repetition history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultRecord {
    id: FaultId,
    project_name: String,
    entity_type: String,
    entity_uuid: Uuid,
    exception_type: String,
    exception_class: String,
    exception_message: String,
    repetitions: u64,
    status: FaultStatus,
    created_at: DateTime<Utc>,
    #[serde(deserialize_with = "present_or_null")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "present_or_null")]
    alerted_at: Option<DateTime<Utc>>,
}

// A nullable field that must still appear in the payload.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::deserialize(deserializer)
}

impl FaultRecord {
    /// Create a first-observation record
    ///
    /// Use [`crate::FaultFactory`] unless the id has already been computed.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn create(
        id: FaultId,
        project_name: impl Into<String>,
        entity_type: impl Into<String>,
        entity_uuid: Uuid,
        exception_type: impl Into<String>,
        exception_class: impl Into<String>,
        exception_message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project_name: project_name.into(),
            entity_type: entity_type.into(),
            entity_uuid,
            exception_type: exception_type.into(),
            exception_class: exception_class.into(),
            exception_message: exception_message.into(),
            repetitions: 1,
            status: FaultStatus::New,
            created_at: now,
            updated_at: None,
            alerted_at: None,
        }
    }

    /// Record one more observation of this fault
    ///
    /// `updated_at` never moves backwards, even if `now` does.
    #[must_use]
    pub fn increment(mut self, now: DateTime<Utc>) -> Self {
        self.repetitions = self.repetitions.saturating_add(1);
        self.updated_at = Some(self.updated_at.map_or(now, |prev| prev.max(now)));
        self
    }

    /// Record a delivered notification
    #[must_use]
    pub fn mark_processed(mut self, now: DateTime<Utc>) -> Self {
        self.alerted_at = Some(self.alerted_at.map_or(now, |prev| prev.max(now)));
        self.status = FaultStatus::Processed;
        self
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> FaultId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    #[inline]
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    #[inline]
    #[must_use]
    pub fn entity_uuid(&self) -> Uuid {
        self.entity_uuid
    }

    /// Raw exception type label as stored
    #[inline]
    #[must_use]
    pub fn exception_type(&self) -> &str {
        &self.exception_type
    }

    /// Parsed severity tier
    ///
    /// # Errors
    /// Returns `RecordError::UnknownSeverity` if the stored label is not a tier
    #[inline]
    pub fn severity(&self) -> Result<FaultSeverity, RecordError> {
        self.exception_type.parse()
    }

    #[inline]
    #[must_use]
    pub fn exception_class(&self) -> &str {
        &self.exception_class
    }

    #[inline]
    #[must_use]
    pub fn exception_message(&self) -> &str {
        &self.exception_message
    }

    #[inline]
    #[must_use]
    pub fn repetitions(&self) -> u64 {
        self.repetitions
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> FaultStatus {
        self.status
    }

    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[inline]
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    #[inline]
    #[must_use]
    pub fn alerted_at(&self) -> Option<DateTime<Utc>> {
        self.alerted_at
    }

    /// Encode as the persisted flat JSON object
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a persisted payload
    ///
    /// Every field must be present; `updatedAt` and `alertedAt` may be `null`.
    ///
    /// # Errors
    /// - `RecordError::Serialization` if a field is missing or mistyped
    /// - `RecordError::InvalidData` if the counter is zero
    pub fn from_json(data: &str) -> Result<Self, RecordError> {
        let record: Self = serde_json::from_str(data)?;
        if record.repetitions == 0 {
            return Err(RecordError::InvalidData(format!(
                "record {} has zero repetitions",
                record.id
            )));
        }
        Ok(record)
    }
}
