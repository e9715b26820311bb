//! Identity generator and record construction

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::RecordError;
use crate::id::FaultId;
use crate::record::FaultRecord;
use crate::severity::{classify, FaultSeverity, ReportedFault};

/// Builds fault records and derives their identity
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultFactory;

impl FaultFactory {
    /// Create new factory
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Derive the fault id from its signature
    #[inline]
    #[must_use]
    pub fn compute_id(
        &self,
        project_name: &str,
        exception_type: &str,
        exception_class: &str,
        exception_message: &str,
    ) -> FaultId {
        FaultId::compute(project_name, exception_type, exception_class, exception_message)
    }

    /// Severity tier of a raised fault
    #[inline]
    #[must_use]
    pub fn classify(&self, fault: &dyn ReportedFault) -> FaultSeverity {
        classify(fault)
    }

    /// Build a first-observation record stamped with the current time
    ///
    /// # Errors
    /// Returns `RecordError::InvalidUuid` if `entity_uuid` is not a uuid
    pub fn build(
        &self,
        project_name: &str,
        entity_type: &str,
        entity_uuid: &str,
        exception_type: &str,
        exception_class: &str,
        exception_message: &str,
    ) -> Result<FaultRecord, RecordError> {
        self.build_at(
            project_name,
            entity_type,
            entity_uuid,
            exception_type,
            exception_class,
            exception_message,
            Utc::now(),
        )
    }

    /// Build a first-observation record created at `now`
    ///
    /// # Errors
    /// Returns `RecordError::InvalidUuid` if `entity_uuid` is not a uuid
    #[allow(clippy::too_many_arguments)]
    pub fn build_at(
        &self,
        project_name: &str,
        entity_type: &str,
        entity_uuid: &str,
        exception_type: &str,
        exception_class: &str,
        exception_message: &str,
        now: DateTime<Utc>,
    ) -> Result<FaultRecord, RecordError> {
        let entity_uuid = Uuid::parse_str(entity_uuid)?;
        let id = self.compute_id(project_name, exception_type, exception_class, exception_message);

        Ok(FaultRecord::create(
            id,
            project_name,
            entity_type,
            entity_uuid,
            exception_type,
            exception_class,
            exception_message,
            now,
        ))
    }

    /// Build a record straight from a raised fault
    ///
    /// # Errors
    /// Returns `RecordError::InvalidUuid` if `entity_uuid` is not a uuid
    pub fn from_fault(
        &self,
        project_name: &str,
        entity_type: &str,
        entity_uuid: &str,
        fault: &dyn ReportedFault,
    ) -> Result<FaultRecord, RecordError> {
        let severity = self.classify(fault);
        self.build(
            project_name,
            entity_type,
            entity_uuid,
            severity.as_str(),
            &fault.fault_class(),
            &fault.to_string(),
        )
    }
}
