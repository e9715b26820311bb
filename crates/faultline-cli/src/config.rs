//! File configuration for the `faultline` binary

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use faultline_escalation::{AlertaConfig, EscalationConfig};
use faultline_store::{FaultStore, KvStore, MemoryKv};
use serde::{Deserialize, Serialize};

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct FaultlineConfig {
    pub(crate) project: ProjectConfig,
    pub(crate) escalation: EscalationConfig,
    pub(crate) store: StoreConfig,
    pub(crate) alerta: AlertaConfig,
    pub(crate) log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ProjectConfig {
    pub(crate) name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
        }
    }
}

/// Key-value backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Backend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct StoreConfig {
    pub(crate) backend: Backend,
    pub(crate) url: String,
    /// Optional key prefix for the Redis backend
    pub(crate) namespace: Option<String>,
    /// Record expiry; unset keeps records forever
    pub(crate) ttl_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            url: "redis://127.0.0.1:6379".to_string(),
            namespace: None,
            ttl_secs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LogConfig {
    /// Emit JSON log lines
    pub(crate) json: bool,
}

impl FaultlineConfig {
    /// Load from `path`; a missing file yields defaults
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub(crate) fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.escalation.validate()?;
        Ok(config)
    }

    /// Open the configured store
    pub(crate) async fn open_store(&self) -> anyhow::Result<Arc<FaultStore>> {
        let kv: Arc<dyn KvStore> = match self.store.backend {
            Backend::Memory => Arc::new(MemoryKv::new()),
            Backend::Redis => connect_redis(&self.store).await?,
        };
        let ttl = self.store.ttl_secs.map(Duration::from_secs);

        Ok(Arc::new(
            FaultStore::new(self.project.name.clone(), kv).with_ttl(ttl),
        ))
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(config: &StoreConfig) -> anyhow::Result<Arc<dyn KvStore>> {
    let kv = faultline_store::RedisKv::connect(&config.url, config.namespace.clone())
        .await
        .with_context(|| format!("failed to connect to {}", config.url))?;
    Ok(Arc::new(kv))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_config: &StoreConfig) -> anyhow::Result<Arc<dyn KvStore>> {
    anyhow::bail!("redis backend requires building with the `redis` feature")
}
