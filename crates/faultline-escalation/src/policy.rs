//! Escalation policy
//!
//! Decides, for one stored fault, whether a notification is due now and at
//! which tier. Every decision starts with the gate in
//! [`EscalationPolicy::should_process`]; a delivered notification is recorded
//! through [`FaultStore::mark_alerted`], so repetitions that arrived while the
//! notification was in flight are kept.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use faultline_record::{FaultId, FaultRecord, FaultSeverity, FaultStatus};
use faultline_store::FaultStore;
use tokio::sync::Mutex;

use crate::config::EscalationConfig;
use crate::error::EscalationError;
use crate::gateway::{AlertOverrides, NotificationGateway};

/// Tier a notification is sent at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyTier {
    Critical,
    Emergency,
}

impl NotifyTier {
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Emergency => "emergency",
        }
    }
}

impl fmt::Display for NotifyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of handling one fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Escalation {
    /// Gate closed; nothing evaluated
    Skipped,
    /// Gate open but the fault is below every threshold
    Quiet,
    /// Notification delivered and recorded
    Notified(NotifyTier),
}

impl Escalation {
    #[inline]
    #[must_use]
    pub fn is_notified(self) -> bool {
        matches!(self, Self::Notified(_))
    }
}

impl fmt::Display for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => f.write_str("skipped"),
            Self::Quiet => f.write_str("quiet"),
            Self::Notified(tier) => write!(f, "notified ({tier})"),
        }
    }
}

/// Threshold-driven escalation over a fault store
pub struct EscalationPolicy {
    store: Arc<FaultStore>,
    gateway: Arc<dyn NotificationGateway>,
    config: EscalationConfig,
    /// Ids with a decision in progress through `handle_id`
    in_flight: DashMap<FaultId, Arc<Mutex<()>>>,
}

impl fmt::Debug for EscalationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EscalationPolicy")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl EscalationPolicy {
    /// Create policy
    ///
    /// # Errors
    /// Returns `EscalationError::Configuration` if the config is invalid
    pub fn new(
        store: Arc<FaultStore>,
        gateway: Arc<dyn NotificationGateway>,
        config: EscalationConfig,
    ) -> Result<Self, EscalationError> {
        config.validate()?;
        Ok(Self {
            store,
            gateway,
            config,
            in_flight: DashMap::new(),
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<FaultStore> {
        &self.store
    }

    /// Gate: is this fault eligible for a decision at `now`
    ///
    /// New faults always pass. Processed faults need both timestamps, must
    /// have repeated since the last notification (whole seconds), and must
    /// pass the configured delay check.
    #[must_use]
    pub fn should_process(&self, record: &FaultRecord, now: DateTime<Utc>) -> bool {
        if record.status() == FaultStatus::New {
            return true;
        }

        let (Some(updated_at), Some(alerted_at)) = (record.updated_at(), record.alerted_at())
        else {
            return false;
        };

        if alerted_at.timestamp() > updated_at.timestamp() {
            return false;
        }

        self.config.delay_elapsed(alerted_at, now)
    }

    /// Tier the record escalates to, if any
    ///
    /// # Errors
    /// Returns `EscalationError::UnknownSeverity` if the stored exception type
    /// has no handler
    pub fn tier(&self, record: &FaultRecord) -> Result<Option<NotifyTier>, EscalationError> {
        let severity = record
            .severity()
            .map_err(|_| EscalationError::UnknownSeverity {
                fault_id: record.id(),
                exception_type: record.exception_type().to_string(),
            })?;

        let thresholds = &self.config.thresholds;
        let repetitions = record.repetitions();

        Ok(match severity {
            FaultSeverity::Emergency => Some(NotifyTier::Emergency),
            FaultSeverity::Critical => Some(NotifyTier::Critical),
            FaultSeverity::Alert => escalate(
                repetitions,
                thresholds.critical_alert,
                thresholds.emergency_alert,
            ),
            FaultSeverity::Error => escalate(
                repetitions,
                thresholds.critical_error,
                thresholds.emergency_error,
            ),
        })
    }

    /// Handle a record at the current time
    ///
    /// # Errors
    /// See [`EscalationPolicy::handle_at`]
    pub async fn handle(&self, record: &FaultRecord) -> Result<Escalation, EscalationError> {
        self.handle_at(record, Utc::now()).await
    }

    /// Load a record by id and handle it at the current time
    ///
    /// Deliveries of the same id are serialized: each one loads the record
    /// only after the previous decision was persisted, so a redelivery sees
    /// the processed state instead of notifying twice.
    ///
    /// # Errors
    /// Returns `EscalationError::Store` if the record cannot be loaded, plus
    /// everything [`EscalationPolicy::handle_at`] returns
    pub async fn handle_id(&self, id: &FaultId) -> Result<Escalation, EscalationError> {
        let lock = self.in_flight.entry(*id).or_default().clone();
        let outcome = {
            let _guard = lock.lock().await;
            match self.store.get(id).await {
                Ok(record) => self.handle(&record).await,
                Err(err) => Err(err.into()),
            }
        };
        drop(lock);

        self.in_flight.remove_if(id, |_, l| Arc::strong_count(l) == 1);
        outcome
    }

    /// Handle a record at `now`
    ///
    /// Decides on the caller's snapshot without holding any per-id lock; two
    /// concurrent calls for the same fault may both notify. Use
    /// [`EscalationPolicy::handle_id`] when deliveries can overlap.
    ///
    /// # Errors
    /// - `EscalationError::UnknownSeverity` for an exception type with no handler
    /// - `EscalationError::Notify` if the gateway fails; the record is untouched
    /// - `EscalationError::Store` if the delivered notification cannot be recorded
    pub async fn handle_at(
        &self,
        record: &FaultRecord,
        now: DateTime<Utc>,
    ) -> Result<Escalation, EscalationError> {
        let fault_id = record.id();

        if !self.should_process(record, now) {
            tracing::debug!(%fault_id, status = ?record.status(), "gate closed");
            return Ok(Escalation::Skipped);
        }

        let Some(tier) = self.tier(record)? else {
            tracing::debug!(
                %fault_id,
                repetitions = record.repetitions(),
                "below notification thresholds"
            );
            return Ok(Escalation::Quiet);
        };

        let overrides = AlertOverrides::default()
            .with_severity(self.label(tier))
            .with_resource(record.project_name());

        if let Err(err) = self
            .gateway
            .notify(record.exception_message(), &overrides)
            .await
        {
            tracing::warn!(
                %fault_id,
                %tier,
                rejected = err.is_rejection(),
                error = %err,
                "notification failed"
            );
            return Err(err.into());
        }

        let stored = self.store.mark_alerted(&fault_id, now).await?;

        tracing::info!(
            %fault_id,
            %tier,
            project = record.project_name(),
            repetitions = stored.repetitions(),
            "fault notified"
        );

        Ok(Escalation::Notified(tier))
    }

    fn label(&self, tier: NotifyTier) -> &str {
        match tier {
            NotifyTier::Emergency => &self.config.labels.emergency,
            NotifyTier::Critical => &self.config.labels.critical,
        }
    }
}

fn escalate(repetitions: u64, critical: u64, emergency: u64) -> Option<NotifyTier> {
    if repetitions > emergency {
        Some(NotifyTier::Emergency)
    } else if repetitions > critical {
        Some(NotifyTier::Critical)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DelayCheck, Thresholds};
    use crate::error::NotifyError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use faultline_record::FaultFactory;
    use faultline_store::MemoryKv;
    use std::sync::Mutex;

    const PROJECT: &str = "billing";
    const UUID: &str = "7bd58997-cbd4-4a48-a068-f821d8408391";

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, AlertOverrides)>>,
        fail: bool,
        latency: Option<std::time::Duration>,
    }

    impl Recorder {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn slow() -> Self {
            Self {
                latency: Some(std::time::Duration::from_millis(20)),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(String, AlertOverrides)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationGateway for Recorder {
        async fn notify(
            &self,
            message: &str,
            overrides: &AlertOverrides,
        ) -> Result<(), NotifyError> {
            self.calls
                .lock()
                .unwrap()
                .push((message.to_string(), overrides.clone()));
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            if self.fail {
                return Err(NotifyError::BadStatusCode {
                    expected: 201,
                    actual: 503,
                });
            }
            Ok(())
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn setup(config: EscalationConfig, gateway: Arc<Recorder>) -> EscalationPolicy {
        let store = Arc::new(FaultStore::new(PROJECT, Arc::new(MemoryKv::new())));
        EscalationPolicy::new(store, gateway, config).unwrap()
    }

    fn record(exception_type: &str, now: DateTime<Utc>) -> FaultRecord {
        FaultFactory::new()
            .build_at(PROJECT, "InvoiceCommand", UUID, exception_type, "Timeout", "upstream timed out", now)
            .unwrap()
    }

    fn with_repetitions(record: FaultRecord, repetitions: u64, now: DateTime<Utc>) -> FaultRecord {
        (1..repetitions).fold(record, |r, _| r.increment(now))
    }

    #[test]
    fn rejects_invalid_config() {
        let store = Arc::new(FaultStore::new(PROJECT, Arc::new(MemoryKv::new())));
        let config = EscalationConfig::default().with_thresholds(Thresholds {
            emergency_error: 1,
            ..Thresholds::default()
        });
        let err = EscalationPolicy::new(store, Arc::new(Recorder::default()), config).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn gate_passes_new_faults() {
        let policy = setup(EscalationConfig::default(), Arc::default());
        assert!(policy.should_process(&record("error", at(0)), at(0)));
    }

    #[test]
    fn gate_requires_both_timestamps() {
        let policy = setup(EscalationConfig::default().with_delay_secs(0), Arc::default());
        // Processed without any repetition: updatedAt is null.
        let processed = record("alert", at(0)).mark_processed(at(0));
        assert!(!policy.should_process(&processed, at(0)));
    }

    #[test]
    fn gate_closed_when_alerted_after_update() {
        let policy = setup(
            EscalationConfig::default()
                .with_delay_check(DelayCheck::Elapsed)
                .with_delay_secs(0),
            Arc::default(),
        );
        let r = record("alert", at(0)).increment(at(10)).mark_processed(at(20));
        assert!(!policy.should_process(&r, at(1000)));
    }

    #[test]
    fn gate_is_idempotent_when_delay_not_met() {
        let policy = setup(EscalationConfig::default(), Arc::default());
        let r = record("alert", at(0)).increment(at(10)).mark_processed(at(10));
        assert_eq!(r.alerted_at(), r.updated_at());
        for now in [at(10), at(11), at(500)] {
            assert!(!policy.should_process(&r, now));
            assert!(!policy.should_process(&r, now));
        }
    }

    #[test]
    fn legacy_gate_never_reopens_after_notification() {
        let policy = setup(EscalationConfig::default(), Arc::default());
        let r = record("alert", at(0))
            .increment(at(10))
            .mark_processed(at(10))
            .increment(at(20));
        assert!(!policy.should_process(&r, at(10_000)));
    }

    #[test]
    fn elapsed_gate_reopens_after_delay() {
        let policy = setup(
            EscalationConfig::default().with_delay_check(DelayCheck::Elapsed),
            Arc::default(),
        );
        let r = record("alert", at(0))
            .increment(at(10))
            .mark_processed(at(10))
            .increment(at(20));
        assert!(!policy.should_process(&r, at(609)));
        assert!(policy.should_process(&r, at(610)));
    }

    #[test]
    fn alert_threshold_boundaries() {
        let policy = setup(EscalationConfig::default(), Arc::default());
        let base = record("alert", at(0));
        let tier = |n| policy.tier(&with_repetitions(base.clone(), n, at(1))).unwrap();

        assert_eq!(tier(5), None);
        assert_eq!(tier(6), Some(NotifyTier::Critical));
        assert_eq!(tier(10), Some(NotifyTier::Critical));
        assert_eq!(tier(11), Some(NotifyTier::Emergency));
    }

    #[test]
    fn error_threshold_boundaries() {
        let policy = setup(EscalationConfig::default(), Arc::default());
        let base = record("error", at(0));
        let tier = |n| policy.tier(&with_repetitions(base.clone(), n, at(1))).unwrap();

        assert_eq!(tier(1), None);
        assert_eq!(tier(50), None);
        assert_eq!(tier(51), Some(NotifyTier::Critical));
        assert_eq!(tier(100), Some(NotifyTier::Critical));
        assert_eq!(tier(101), Some(NotifyTier::Emergency));
    }

    #[test]
    fn top_severities_always_escalate() {
        let policy = setup(EscalationConfig::default(), Arc::default());
        assert_eq!(
            policy.tier(&record("emergency", at(0))).unwrap(),
            Some(NotifyTier::Emergency)
        );
        assert_eq!(
            policy.tier(&record("critical", at(0))).unwrap(),
            Some(NotifyTier::Critical)
        );
    }

    #[tokio::test]
    async fn unknown_severity_is_configuration_error() {
        let gateway = Arc::new(Recorder::default());
        let policy = setup(EscalationConfig::default(), gateway.clone());
        let err = policy.handle_at(&record("warning", at(0)), at(0)).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn emergency_notifies_and_marks_processed() {
        let gateway = Arc::new(Recorder::default());
        let policy = setup(EscalationConfig::default(), gateway.clone());
        let id = policy.store().store(record("emergency", at(0))).await.unwrap();
        let stored = policy.store().get(&id).await.unwrap();

        let outcome = policy.handle_at(&stored, at(5)).await.unwrap();
        assert_eq!(outcome, Escalation::Notified(NotifyTier::Emergency));

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "upstream timed out");
        assert_eq!(calls[0].1.severity.as_deref(), Some("critical"));
        assert_eq!(calls[0].1.resource.as_deref(), Some(PROJECT));

        let after = policy.store().get(&id).await.unwrap();
        assert_eq!(after.status(), FaultStatus::Processed);
        assert_eq!(after.alerted_at(), Some(at(5)));
        assert_eq!(after.repetitions(), 1);
    }

    #[tokio::test]
    async fn repeat_below_threshold_stays_quiet() {
        let gateway = Arc::new(Recorder::default());
        let policy = setup(EscalationConfig::default(), gateway.clone());
        let first = record("alert", at(0));
        let id = policy.store().store_at(first.clone(), at(0)).await.unwrap();
        policy.store().store_at(first, at(1)).await.unwrap();

        let stored = policy.store().get(&id).await.unwrap();
        assert_eq!(stored.repetitions(), 2);

        let outcome = policy.handle_at(&stored, at(2)).await.unwrap();
        assert_eq!(outcome, Escalation::Quiet);
        assert!(gateway.calls().is_empty());
        assert_eq!(policy.store().get(&id).await.unwrap(), stored);
    }

    #[tokio::test]
    async fn repeated_error_below_threshold_stays_quiet() {
        let gateway = Arc::new(Recorder::default());
        let policy = setup(EscalationConfig::default(), gateway.clone());
        let first = record("error", at(0));
        let id = policy.store().store_at(first.clone(), at(0)).await.unwrap();
        policy.store().store_at(first, at(1)).await.unwrap();

        let stored = policy.store().get(&id).await.unwrap();
        assert_eq!(stored.repetitions(), 2);
        assert_eq!(stored.status(), FaultStatus::New);

        assert_eq!(policy.handle_at(&stored, at(2)).await.unwrap(), Escalation::Quiet);
        assert!(gateway.calls().is_empty());
        assert_eq!(policy.store().get(&id).await.unwrap(), stored);
    }

    #[tokio::test]
    async fn overlapping_deliveries_notify_once() {
        let gateway = Arc::new(Recorder::slow());
        let policy = setup(EscalationConfig::default(), gateway.clone());
        let id = policy.store().store(record("emergency", at(0))).await.unwrap();

        let (a, b) = tokio::join!(policy.handle_id(&id), policy.handle_id(&id));
        let outcomes = [a.unwrap(), b.unwrap()];

        assert_eq!(outcomes.iter().filter(|o| o.is_notified()).count(), 1);
        assert!(outcomes.contains(&Escalation::Skipped));
        assert_eq!(gateway.calls().len(), 1);
        assert!(policy.in_flight.is_empty());
    }

    #[tokio::test]
    async fn failed_notification_leaves_record_untouched() {
        let gateway = Arc::new(Recorder::failing());
        let policy = setup(EscalationConfig::default(), gateway.clone());
        let id = policy.store().store(record("critical", at(0))).await.unwrap();
        let stored = policy.store().get(&id).await.unwrap();

        let err = policy.handle_at(&stored, at(1)).await.unwrap_err();
        assert!(matches!(err, EscalationError::Notify(_)));
        assert_eq!(gateway.calls().len(), 1);
        assert_eq!(policy.store().get(&id).await.unwrap(), stored);
    }

    #[tokio::test]
    async fn handled_fault_is_skipped_next_time() {
        let gateway = Arc::new(Recorder::default());
        let policy = setup(EscalationConfig::default(), gateway.clone());
        let id = policy.store().store(record("critical", at(0))).await.unwrap();

        let first = policy.handle_id(&id).await.unwrap();
        assert_eq!(first, Escalation::Notified(NotifyTier::Critical));
        assert_eq!(gateway.calls()[0].1.severity.as_deref(), Some("major"));

        let second = policy.handle_id(&id).await.unwrap();
        assert_eq!(second, Escalation::Skipped);
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let policy = setup(EscalationConfig::default(), Arc::default());
        let err = policy
            .handle_id(&FaultId::compute(PROJECT, "error", "Nope", "nothing"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
