//! Key-value backend contract

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::KvError;

/// String key-value store with optional expiry and an explicit flush
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Value under `key`, `None` if absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError>;

    /// Flush pending writes to durable storage
    async fn save(&self) -> Result<(), KvError>;
}

#[async_trait]
impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        (**self).set(key, value, ttl).await
    }

    async fn save(&self) -> Result<(), KvError> {
        (**self).save().await
    }
}
