//! End-to-end tests: reporter -> queue -> consumer -> policy -> gateway

use std::sync::Arc;

use faultline_escalation::{
    ChannelQueue, DelayCheck, Escalation, EscalationConfig, EscalationPolicy, FaultConsumer,
    FaultQueue, FaultReporter, NotifyTier, QueueMessage, FAILED_FAULT_TOPIC,
};
use faultline_record::{FaultSeverity, FaultStatus};
use faultline_store::FaultStore;
use faultline_test_utils::{
    at, memory_store, not_joined_record, record_with_type, FailingGateway, FailingKv,
    RecordingGateway, TestFault, ENTITY_TYPE, ENTITY_UUID, NOT_JOINED_ID, PROJECT,
};
use pretty_assertions::assert_eq;

struct Pipeline {
    store: Arc<FaultStore>,
    gateway: Arc<RecordingGateway>,
    reporter: FaultReporter,
    consumer: FaultConsumer,
    receiver: tokio::sync::mpsc::Receiver<QueueMessage>,
}

fn pipeline(config: EscalationConfig) -> Pipeline {
    let store = memory_store();
    let gateway = Arc::new(RecordingGateway::new());
    let (queue, receiver) = ChannelQueue::bounded(64);
    let policy = EscalationPolicy::new(store.clone(), gateway.clone(), config).unwrap();

    Pipeline {
        reporter: FaultReporter::new(store.clone(), Arc::new(queue)),
        consumer: FaultConsumer::new(Arc::new(policy)),
        store,
        gateway,
        receiver,
    }
}

#[tokio::test]
async fn new_fault_scenario_stores_and_enqueues_id() {
    let mut p = pipeline(EscalationConfig::default());

    let id = p.reporter.submit(not_joined_record(at(0))).await.unwrap();
    assert_eq!(id.to_string(), NOT_JOINED_ID);

    let message = p.receiver.recv().await.unwrap();
    assert_eq!(message.topic, FAILED_FAULT_TOPIC);
    assert_eq!(message.body, NOT_JOINED_ID);

    let stored = p.store.get(&id).await.unwrap();
    assert_eq!(stored.repetitions(), 1);
    assert_eq!(stored.status(), FaultStatus::New);

    // Single error-level occurrence stays below every threshold.
    assert_eq!(p.consumer.process(&message).await, Some(Escalation::Quiet));
    assert_eq!(p.gateway.count(), 0);
}

#[tokio::test]
async fn repeated_alerts_escalate_through_tiers() {
    let mut p = pipeline(EscalationConfig::default());
    let fault = TestFault::new(Some(FaultSeverity::Alert), "QuotaExceeded", "quota exceeded");

    let mut outcomes = Vec::new();
    for _ in 0..11 {
        p.reporter
            .report(ENTITY_TYPE, ENTITY_UUID, &fault)
            .await
            .unwrap();
        let message = p.receiver.recv().await.unwrap();
        outcomes.push(p.consumer.process(&message).await.unwrap());
    }

    // Quiet up to the critical threshold, then one critical notification;
    // the legacy delay check keeps the fault quiet afterwards.
    assert!(outcomes[..5].iter().all(|o| *o == Escalation::Quiet));
    assert_eq!(outcomes[5], Escalation::Notified(NotifyTier::Critical));
    assert!(outcomes[6..].iter().all(|o| *o == Escalation::Skipped));

    let sent = p.gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message, "quota exceeded");
    assert_eq!(sent[0].overrides.severity.as_deref(), Some("major"));
    assert_eq!(sent[0].overrides.resource.as_deref(), Some(PROJECT));

    let stored = p
        .store
        .get_by_identity("alert", "QuotaExceeded", "quota exceeded")
        .await
        .unwrap();
    assert_eq!(stored.repetitions(), 11);
    assert_eq!(stored.status(), FaultStatus::Processed);
}

#[tokio::test]
async fn emergency_fault_notifies_once() {
    let mut p = pipeline(EscalationConfig::default());
    let fault = TestFault::new(Some(FaultSeverity::Emergency), "DatabaseDown", "db down");

    let id = p
        .reporter
        .report(ENTITY_TYPE, ENTITY_UUID, &fault)
        .await
        .unwrap();
    let message = p.receiver.recv().await.unwrap();
    assert_eq!(
        p.consumer.process(&message).await,
        Some(Escalation::Notified(NotifyTier::Emergency))
    );

    let stored = p.store.get(&id).await.unwrap();
    assert_eq!(stored.status(), FaultStatus::Processed);
    assert!(stored.alerted_at().is_some());
    assert_eq!(p.gateway.sent()[0].overrides.severity.as_deref(), Some("critical"));

    // At-least-once redelivery of the same id is gated.
    assert_eq!(p.consumer.process(&message).await, Some(Escalation::Skipped));
    assert_eq!(p.gateway.count(), 1);
}

#[tokio::test]
async fn untagged_fault_defaults_to_error() {
    let mut p = pipeline(EscalationConfig::default());
    let fault = TestFault::new(None, "Surprise", "unexpected");

    let id = p
        .reporter
        .report(ENTITY_TYPE, ENTITY_UUID, &fault)
        .await
        .unwrap();
    let stored = p.store.get(&id).await.unwrap();
    assert_eq!(stored.exception_type(), "error");

    let message = p.receiver.recv().await.unwrap();
    assert_eq!(p.consumer.process(&message).await, Some(Escalation::Quiet));
}

#[tokio::test]
async fn consumer_acknowledges_failures() {
    let p = pipeline(EscalationConfig::default());

    let garbage = QueueMessage {
        topic: FAILED_FAULT_TOPIC.to_string(),
        body: "not-a-fault-id".to_string(),
    };
    assert_eq!(p.consumer.process(&garbage).await, None);

    let missing = QueueMessage {
        topic: FAILED_FAULT_TOPIC.to_string(),
        body: NOT_JOINED_ID.to_string(),
    };
    assert_eq!(p.consumer.process(&missing).await, None);

    let err = p.consumer.consume(NOT_JOINED_ID).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn unexpected_topic_is_acknowledged_unprocessed() {
    let p = pipeline(EscalationConfig::default());
    let id = p
        .store
        .store(record_with_type("emergency", "DatabaseDown", at(0)))
        .await
        .unwrap();

    let stray = QueueMessage {
        topic: "log.command.succeeded".to_string(),
        body: id.to_string(),
    };
    assert_eq!(p.consumer.process(&stray).await, None);
    assert_eq!(p.gateway.count(), 0);
    assert_eq!(p.store.get(&id).await.unwrap().status(), FaultStatus::New);
}

#[tokio::test]
async fn run_drains_queue_and_counts() {
    let p = pipeline(EscalationConfig::default());
    let Pipeline {
        reporter,
        consumer,
        receiver,
        gateway,
        ..
    } = p;

    let emergency = TestFault::new(Some(FaultSeverity::Emergency), "DatabaseDown", "db down");
    let alert = TestFault::new(Some(FaultSeverity::Alert), "QuotaExceeded", "quota exceeded");

    let worker = tokio::spawn(async move { consumer.run(receiver).await });

    reporter
        .report(ENTITY_TYPE, ENTITY_UUID, &emergency)
        .await
        .unwrap();
    reporter
        .report(ENTITY_TYPE, ENTITY_UUID, &alert)
        .await
        .unwrap();
    drop(reporter);

    let stats = worker.await.unwrap();
    assert_eq!(stats.received, 2);
    assert_eq!(stats.notified, 1);
    assert_eq!(stats.quiet, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(gateway.count(), 1);
}

#[tokio::test]
async fn gateway_failure_leaves_fault_eligible() {
    let store = memory_store();
    let policy = EscalationPolicy::new(
        store.clone(),
        Arc::new(FailingGateway::with_status(502)),
        EscalationConfig::default(),
    )
    .unwrap();
    let consumer = FaultConsumer::new(Arc::new(policy));

    let id = store
        .store(record_with_type("critical", "DiskFull", at(0)))
        .await
        .unwrap();

    assert!(consumer.consume(&id.to_string()).await.is_err());
    let stored = store.get(&id).await.unwrap();
    assert_eq!(stored.status(), FaultStatus::New);
    assert!(stored.alerted_at().is_none());
}

#[tokio::test]
async fn elapsed_delay_allows_renotification() {
    let store = memory_store();
    let gateway = Arc::new(RecordingGateway::new());
    let policy = EscalationPolicy::new(
        store.clone(),
        gateway.clone(),
        EscalationConfig::default()
            .with_delay_check(DelayCheck::Elapsed)
            .with_delay_secs(60),
    )
    .unwrap();

    let record = record_with_type("critical", "DiskFull", at(0));
    let id = store.store_at(record.clone(), at(0)).await.unwrap();

    let first = store.get(&id).await.unwrap();
    assert!(policy.handle_at(&first, at(1)).await.unwrap().is_notified());

    store.store_at(record.clone(), at(30)).await.unwrap();
    let repeated = store.get(&id).await.unwrap();
    assert_eq!(policy.handle_at(&repeated, at(30)).await.unwrap(), Escalation::Skipped);
    assert_eq!(
        policy.handle_at(&repeated, at(61)).await.unwrap(),
        Escalation::Notified(NotifyTier::Critical)
    );

    let after = store.get(&id).await.unwrap();
    assert_eq!(after.repetitions(), 2);
    assert_eq!(after.alerted_at(), Some(at(61)));
    assert_eq!(gateway.count(), 2);
}

#[tokio::test]
async fn storage_failure_surfaces_from_reporter() {
    let kv = FailingKv::new();
    kv.fail_writes(true);
    let store = Arc::new(FaultStore::new(PROJECT, Arc::new(kv)));
    let (queue, mut receiver) = ChannelQueue::bounded(4);
    let reporter = FaultReporter::new(store, Arc::new(queue.clone()));

    let fault = TestFault::new(Some(FaultSeverity::Critical), "DiskFull", "disk full");
    let err = reporter
        .report(ENTITY_TYPE, ENTITY_UUID, &fault)
        .await
        .unwrap_err();
    assert!(matches!(err, faultline_escalation::ReportError::Store(_)));

    // Nothing was handed off.
    queue.enqueue(FAILED_FAULT_TOPIC, "marker").await.unwrap();
    assert_eq!(receiver.recv().await.unwrap().body, "marker");
}
