//! Testing utilities for faultline workspace
//!
//! Shared fixtures, clocks and test doubles.

#![allow(missing_docs)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use faultline_escalation::{AlertOverrides, NotificationGateway, NotifyError};
use faultline_record::{FaultFactory, FaultRecord, FaultSeverity, ReportedFault};
use faultline_store::{FaultStore, KvError, KvStore, MemoryKv};

pub const PROJECT: &str = "adgoal-alerting";
pub const ENTITY_TYPE: &str =
    r"DataGate\AffiliateNetwork\ShareASale\Application\Command\Program\Validate\ValidateCommand";
pub const ENTITY_UUID: &str = "d299918d-8428-44e0-883e-47003ab99563";
pub const NOT_JOINED_CLASS: &str =
    r"DataGate\AffiliateNetwork\ShareASale\Domain\Exception\Program\NotJoinedException";
pub const NOT_JOINED_MESSAGE: &str = r#"Uncaught PHP Exception DataGate\AffiliateNetwork\ShareASale\Domain\Exception\Program\NotJoinedException: "Program with id '83500' not approved." at /app/src/Domain/Entity/ProgramEntity.php line 195"#;
pub const NOT_JOINED_ID: &str = "0f07097658b257e87e06ea4ca17203e2911c63e1";

/// Fixed instant `secs` seconds after the test epoch
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// First observation of the not-joined fault
pub fn not_joined_record(now: DateTime<Utc>) -> FaultRecord {
    FaultFactory::new()
        .build_at(
            PROJECT,
            ENTITY_TYPE,
            ENTITY_UUID,
            "error",
            NOT_JOINED_CLASS,
            NOT_JOINED_MESSAGE,
            now,
        )
        .unwrap()
}

/// Record with an arbitrary severity label for the test project
pub fn record_with_type(exception_type: &str, class: &str, now: DateTime<Utc>) -> FaultRecord {
    FaultFactory::new()
        .build_at(
            PROJECT,
            ENTITY_TYPE,
            ENTITY_UUID,
            exception_type,
            class,
            "test fault",
            now,
        )
        .unwrap()
}

/// Store over a fresh in-memory backend
pub fn memory_store() -> Arc<FaultStore> {
    Arc::new(FaultStore::new(PROJECT, Arc::new(MemoryKv::new())))
}

/// Fault carrying an explicit severity tag
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TestFault {
    pub severity: Option<FaultSeverity>,
    pub class: String,
    pub message: String,
}

impl TestFault {
    pub fn new(severity: Option<FaultSeverity>, class: &str, message: &str) -> Self {
        Self {
            severity,
            class: class.to_string(),
            message: message.to_string(),
        }
    }
}

impl ReportedFault for TestFault {
    fn severity(&self) -> Option<FaultSeverity> {
        self.severity
    }

    fn fault_class(&self) -> String {
        self.class.clone()
    }
}

/// One captured notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub message: String,
    pub overrides: AlertOverrides,
}

/// Gateway that records every call and accepts it
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn notify(&self, message: &str, overrides: &AlertOverrides) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(SentNotification {
            message: message.to_string(),
            overrides: overrides.clone(),
        });
        Ok(())
    }
}

/// Gateway whose sink answers with a fixed non-201 status
#[derive(Debug)]
pub struct FailingGateway {
    status: u16,
}

impl FailingGateway {
    pub fn with_status(status: u16) -> Self {
        Self { status }
    }
}

#[async_trait]
impl NotificationGateway for FailingGateway {
    async fn notify(&self, _message: &str, _overrides: &AlertOverrides) -> Result<(), NotifyError> {
        Err(NotifyError::BadStatusCode {
            expected: 201,
            actual: self.status,
        })
    }
}

/// Memory backend whose writes can be switched to fail
#[derive(Debug, Clone, Default)]
pub struct FailingKv {
    inner: MemoryKv,
    fail_writes: Arc<AtomicBool>,
}

impl FailingKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KvStore for FailingKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KvError::Rejected {
                key: key.to_string(),
                reason: "writes disabled".to_string(),
            });
        }
        self.inner.set(key, value, ttl).await
    }

    async fn save(&self) -> Result<(), KvError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KvError::SaveFailed("writes disabled".to_string()));
        }
        self.inner.save().await
    }
}
