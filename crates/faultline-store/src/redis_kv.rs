//! Redis adapter for the key-value contract.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::KvError;
use crate::kv::KvStore;

/// Redis-backed store
///
/// `save` issues a synchronous `SAVE`, so every committed fault record is on
/// disk before the caller moves on.
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
    namespace: Option<String>,
}

impl std::fmt::Debug for RedisKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKv")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl RedisKv {
    /// Connect to a Redis server
    ///
    /// # Errors
    /// Returns `KvError::Connection` if the url is invalid or the server is
    /// unreachable
    pub async fn connect(url: &str, namespace: Option<String>) -> Result<Self, KvError> {
        let client = redis::Client::open(url).map_err(|e| KvError::Connection(e.to_string()))?;
        let mut conn = ConnectionManager::new(client)
            .await
            .map_err(|e| KvError::Connection(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| KvError::Connection(e.to_string()))?;

        tracing::debug!(url, "connected to redis");
        Ok(Self { conn, namespace })
    }

    fn prefixed_key(&self, key: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}:{key}"),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(self.prefixed_key(key))
            .await
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let prefixed = self.prefixed_key(key);

        let result: redis::RedisResult<()> = match ttl {
            Some(ttl) => conn.set_ex(&prefixed, value, ttl.as_secs().max(1)).await,
            None => conn.set(&prefixed, value).await,
        };

        result.map_err(|e| KvError::Rejected {
            key: prefixed,
            reason: e.to_string(),
        })
    }

    async fn save(&self) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        redis::cmd("SAVE")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| KvError::SaveFailed(e.to_string()))
    }
}
