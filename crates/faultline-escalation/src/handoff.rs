//! Queue handoff between fault reporting and escalation
//!
//! - [`FaultReporter`]: persists a caught fault and enqueues its id
//! - [`FaultConsumer`]: loads each delivered id and runs the policy
//! - [`ChannelQueue`]: in-process queue over a tokio channel

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use faultline_record::{FaultFactory, FaultId, FaultRecord, ReportedFault};
use faultline_store::FaultStore;
use tokio::sync::mpsc;

use crate::error::{EscalationError, QueueError, ReportError};
use crate::policy::{Escalation, EscalationPolicy};

/// Topic failed-command faults are published on
pub const FAILED_FAULT_TOPIC: &str = "log.command.failed.alert";

/// One queued delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub topic: String,
    pub body: String,
}

/// Outbound queue contract
#[async_trait]
pub trait FaultQueue: Send + Sync {
    /// Enqueue `body` on `topic`
    ///
    /// # Errors
    /// Returns `QueueError` if the message cannot be handed off
    async fn enqueue(&self, topic: &str, body: &str) -> Result<(), QueueError>;
}

/// In-process bounded queue
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    sender: mpsc::Sender<QueueMessage>,
}

impl ChannelQueue {
    /// Create queue and its receiving end
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<QueueMessage>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl FaultQueue for ChannelQueue {
    async fn enqueue(&self, topic: &str, body: &str) -> Result<(), QueueError> {
        self.sender
            .send(QueueMessage {
                topic: topic.to_string(),
                body: body.to_string(),
            })
            .await
            .map_err(|_| QueueError::Closed {
                topic: topic.to_string(),
            })
    }
}

/// Persists caught faults and hands their ids downstream
pub struct FaultReporter {
    factory: FaultFactory,
    store: Arc<FaultStore>,
    queue: Arc<dyn FaultQueue>,
}

impl std::fmt::Debug for FaultReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultReporter")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl FaultReporter {
    /// Create reporter for the store's project
    #[must_use]
    pub fn new(store: Arc<FaultStore>, queue: Arc<dyn FaultQueue>) -> Self {
        Self {
            factory: FaultFactory::new(),
            store,
            queue,
        }
    }

    /// Report a fault raised while handling an entity
    ///
    /// # Errors
    /// - `ReportError::Record` if `entity_uuid` is not a uuid
    /// - `ReportError::Store` if the record cannot be persisted
    /// - `ReportError::Queue` if the id cannot be enqueued
    pub async fn report(
        &self,
        entity_type: &str,
        entity_uuid: &str,
        fault: &(dyn ReportedFault + Send + Sync),
    ) -> Result<FaultId, ReportError> {
        let record = self.factory.from_fault(
            self.store.project_name(),
            entity_type,
            entity_uuid,
            fault,
        )?;
        self.submit(record).await
    }

    /// Persist a prepared record and enqueue its id
    ///
    /// # Errors
    /// Same as [`FaultReporter::report`] minus record construction
    pub async fn submit(&self, record: FaultRecord) -> Result<FaultId, ReportError> {
        let id = self.store.store(record).await?;
        self.queue
            .enqueue(FAILED_FAULT_TOPIC, &id.to_string())
            .await?;
        tracing::debug!(fault_id = %id, topic = FAILED_FAULT_TOPIC, "fault enqueued");
        Ok(id)
    }
}

/// Counters for one consumer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub notified: u64,
    pub quiet: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl ConsumerStats {
    fn record(&mut self, outcome: Option<Escalation>) {
        self.received += 1;
        match outcome {
            Some(Escalation::Notified(_)) => self.notified += 1,
            Some(Escalation::Quiet) => self.quiet += 1,
            Some(Escalation::Skipped) => self.skipped += 1,
            None => self.failed += 1,
        }
    }
}

/// Receives fault ids and runs the escalation policy on each
#[derive(Debug, Clone)]
pub struct FaultConsumer {
    policy: Arc<EscalationPolicy>,
}

impl FaultConsumer {
    #[must_use]
    pub fn new(policy: Arc<EscalationPolicy>) -> Self {
        Self { policy }
    }

    /// Evaluate one delivered id
    ///
    /// # Errors
    /// Returns `EscalationError::InvalidId` for a malformed id, plus anything
    /// [`EscalationPolicy::handle_id`] returns
    pub async fn consume(&self, body: &str) -> Result<Escalation, EscalationError> {
        let id = FaultId::from_str(body.trim()).map_err(|source| EscalationError::InvalidId {
            body: body.to_string(),
            source,
        })?;
        self.policy.handle_id(&id).await
    }

    /// Process one delivery; the message is acknowledged whatever happens
    ///
    /// Returns the outcome, or `None` when processing failed and was logged.
    pub async fn process(&self, message: &QueueMessage) -> Option<Escalation> {
        if message.topic != FAILED_FAULT_TOPIC {
            tracing::warn!(topic = %message.topic, "message on unexpected topic acknowledged");
            return None;
        }

        match self.consume(&message.body).await {
            Ok(outcome) => {
                tracing::debug!(fault_id = %message.body, %outcome, "fault processed");
                Some(outcome)
            }
            Err(err) => {
                tracing::warn!(fault_id = %message.body, error = %err, "fault processing failed");
                None
            }
        }
    }

    /// Drain the queue until every sender is dropped
    pub async fn run(&self, mut receiver: mpsc::Receiver<QueueMessage>) -> ConsumerStats {
        let mut stats = ConsumerStats::default();
        while let Some(message) = receiver.recv().await {
            let outcome = self.process(&message).await;
            stats.record(outcome);
        }
        tracing::info!(
            received = stats.received,
            notified = stats.notified,
            failed = stats.failed,
            "consumer stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_queue_delivers_in_order() {
        let (queue, mut rx) = ChannelQueue::bounded(4);
        queue.enqueue(FAILED_FAULT_TOPIC, "a").await.unwrap();
        queue.enqueue(FAILED_FAULT_TOPIC, "b").await.unwrap();

        assert_eq!(rx.recv().await.unwrap().body, "a");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.topic, "log.command.failed.alert");
        assert_eq!(second.body, "b");
    }

    #[tokio::test]
    async fn channel_queue_reports_closed() {
        let (queue, rx) = ChannelQueue::bounded(1);
        drop(rx);
        let err = queue.enqueue(FAILED_FAULT_TOPIC, "a").await.unwrap_err();
        assert!(matches!(err, QueueError::Closed { topic } if topic == FAILED_FAULT_TOPIC));
    }

    #[test]
    fn stats_count_each_outcome() {
        let mut stats = ConsumerStats::default();
        stats.record(Some(Escalation::Quiet));
        stats.record(Some(Escalation::Skipped));
        stats.record(None);
        assert_eq!(stats.received, 3);
        assert_eq!(stats.quiet, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.notified, 0);
    }
}
