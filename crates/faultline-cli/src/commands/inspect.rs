//! `faultline inspect`: print a stored record

use std::str::FromStr;

use anyhow::Context;
use faultline_record::FaultId;

use crate::config::{Backend, FaultlineConfig};

pub(crate) async fn run(config: &FaultlineConfig, id: &str) -> anyhow::Result<()> {
    let id = FaultId::from_str(id.trim()).with_context(|| format!("invalid fault id '{id}'"))?;

    if config.store.backend == Backend::Memory {
        tracing::warn!("memory backend keeps no records between runs");
    }

    let store = config.open_store().await?;
    let record = store
        .get(&id)
        .await
        .with_context(|| format!("failed to load fault {id}"))?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
