//! `faultline replay`: run recorded faults through the full pipeline
//!
//! Each line of the input is one JSON object with `entityType`, `entityUuid`,
//! `exceptionType`, `exceptionClass` and `exceptionMessage`. Blank lines and
//! lines starting with `#` are ignored.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use faultline_escalation::{
    AlertaConfig, AlertaGateway, ChannelQueue, DryRunGateway, Escalation, EscalationConfig,
    EscalationPolicy, FaultConsumer, FaultReporter, NotificationGateway,
};
use faultline_record::{FaultFactory, FaultId};
use faultline_store::FaultStore;
use serde::Deserialize;

use crate::config::FaultlineConfig;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReplayEntry {
    pub(crate) entity_type: String,
    pub(crate) entity_uuid: String,
    pub(crate) exception_type: String,
    pub(crate) exception_class: String,
    pub(crate) exception_message: String,
}

pub(crate) async fn run(config: &FaultlineConfig, file: &Path, dry_run: bool) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let entries = parse_entries(&content)?;

    let store = config.open_store().await?;
    let gateway = build_gateway(&config.alerta, dry_run)?;

    tracing::info!(
        entries = entries.len(),
        project = store.project_name(),
        "replaying faults"
    );

    let results = replay(entries, store, gateway, config.escalation.clone()).await?;
    for (id, outcome) in &results {
        match outcome {
            Some(outcome) => println!("{id}  {outcome}"),
            None => println!("{id}  failed"),
        }
    }

    let notified = results
        .iter()
        .filter(|(_, o)| o.is_some_and(Escalation::is_notified))
        .count();
    println!("{} faults replayed, {notified} notified", results.len());
    Ok(())
}

pub(crate) fn parse_entries(content: &str) -> anyhow::Result<Vec<ReplayEntry>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(n, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid fault on line {}", n + 1))
        })
        .collect()
}

fn build_gateway(alerta: &AlertaConfig, dry_run: bool) -> anyhow::Result<Arc<dyn NotificationGateway>> {
    if dry_run || alerta.dry_run {
        return Ok(Arc::new(DryRunGateway::new(alerta.defaults.clone())));
    }
    let gateway = AlertaGateway::new(alerta)?;
    tracing::info!(url = gateway.url(), "posting notifications to alerta");
    Ok(Arc::new(gateway))
}

/// Report each entry, then consume its queued id before the next one
pub(crate) async fn replay(
    entries: Vec<ReplayEntry>,
    store: Arc<FaultStore>,
    gateway: Arc<dyn NotificationGateway>,
    escalation: EscalationConfig,
) -> anyhow::Result<Vec<(FaultId, Option<Escalation>)>> {
    let policy = EscalationPolicy::new(store.clone(), gateway, escalation)?;
    let (queue, mut receiver) = ChannelQueue::bounded(16);
    let reporter = FaultReporter::new(store.clone(), Arc::new(queue));
    let consumer = FaultConsumer::new(Arc::new(policy));
    let factory = FaultFactory::new();

    let mut results = Vec::with_capacity(entries.len());
    for entry in entries {
        let record = factory
            .build(
                store.project_name(),
                &entry.entity_type,
                &entry.entity_uuid,
                &entry.exception_type,
                &entry.exception_class,
                &entry.exception_message,
            )
            .with_context(|| format!("invalid fault for entity {}", entry.entity_uuid))?;

        let id = reporter.submit(record).await?;
        let message = receiver.recv().await.context("fault queue closed")?;
        results.push((id, consumer.process(&message).await));
    }

    Ok(results)
}
