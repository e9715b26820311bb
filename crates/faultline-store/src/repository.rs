//! Deduplicating fault repository
//!
//! [`FaultStore`] owns the merge rule: storing a record whose id already exists
//! increments the stored record instead of overwriting it. Every
//! read-modify-write on one id runs under a per-id lock, so concurrent
//! observations of the same fault never lose an increment inside one process.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use faultline_record::{FaultFactory, FaultId, FaultRecord};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::kv::KvStore;

/// Fault repository over a key-value backend
pub struct FaultStore {
    /// Project the identity lookups are scoped to
    project_name: String,
    kv: Arc<dyn KvStore>,
    factory: FaultFactory,
    /// Expiry applied to every write
    ttl: Option<Duration>,
    /// Per-id write locks
    locks: DashMap<FaultId, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for FaultStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultStore")
            .field("project_name", &self.project_name)
            .field("ttl", &self.ttl)
            .field("locked_ids", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl FaultStore {
    /// Create new store
    #[must_use]
    pub fn new(project_name: impl Into<String>, kv: Arc<dyn KvStore>) -> Self {
        Self {
            project_name: project_name.into(),
            kv,
            factory: FaultFactory::new(),
            ttl: None,
            locks: DashMap::new(),
        }
    }

    /// With record expiry
    #[inline]
    #[must_use]
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Project name used for identity lookups
    #[inline]
    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Load a record by id
    ///
    /// # Errors
    /// - `StoreError::NotFound` if no record exists
    /// - `StoreError::Serialization` if the payload is not a valid record
    pub async fn get(&self, id: &FaultId) -> Result<FaultRecord, StoreError> {
        self.load(id)
            .await?
            .ok_or_else(|| StoreError::NotFound { key: id.key() })
    }

    /// Load a record by its signature within this store's project
    ///
    /// # Errors
    /// Same as [`FaultStore::get`]
    pub async fn get_by_identity(
        &self,
        exception_type: &str,
        exception_class: &str,
        exception_message: &str,
    ) -> Result<FaultRecord, StoreError> {
        let id = self.identity(exception_type, exception_class, exception_message);
        self.get(&id).await
    }

    /// Check if a record exists for the signature
    ///
    /// # Errors
    /// Returns `StoreError::Storage` if the backend fails
    pub async fn exists(
        &self,
        exception_type: &str,
        exception_class: &str,
        exception_message: &str,
    ) -> Result<bool, StoreError> {
        let id = self.identity(exception_type, exception_class, exception_message);
        Ok(self.kv.get(&id.key()).await?.is_some())
    }

    /// Persist a newly observed fault, merging with any stored history
    ///
    /// Returns the id the record is stored under.
    ///
    /// # Errors
    /// - `StoreError::Serialization` if the stored payload cannot be decoded
    /// - `StoreError::Storage` if set or save fails
    pub async fn store(&self, record: FaultRecord) -> Result<FaultId, StoreError> {
        self.store_at(record, Utc::now()).await
    }

    /// [`FaultStore::store`] with an explicit clock reading
    ///
    /// # Errors
    /// Same as [`FaultStore::store`]
    pub async fn store_at(
        &self,
        record: FaultRecord,
        now: DateTime<Utc>,
    ) -> Result<FaultId, StoreError> {
        let id = record.id();
        self.with_lock(id, || async move {
            let merged = match self.load(&id).await? {
                Some(existing) => {
                    let existing = existing.increment(now);
                    tracing::debug!(
                        fault_id = %id,
                        repetitions = existing.repetitions(),
                        "fault repeated"
                    );
                    existing
                }
                None => {
                    tracing::debug!(fault_id = %id, "new fault");
                    record
                }
            };
            self.write(&merged).await
        })
        .await?;

        Ok(id)
    }

    /// Record a delivered notification on the stored record
    ///
    /// Re-reads under the id lock so increments that landed while the
    /// notification was in flight are kept.
    ///
    /// # Errors
    /// - `StoreError::NotFound` if the record vanished
    /// - `StoreError::Storage` if set or save fails
    pub async fn mark_alerted(
        &self,
        id: &FaultId,
        now: DateTime<Utc>,
    ) -> Result<FaultRecord, StoreError> {
        let id = *id;
        self.with_lock(id, || async move {
            let record = self.get(&id).await?.mark_processed(now);
            self.write(&record).await?;
            Ok(record)
        })
        .await
    }

    fn identity(&self, exception_type: &str, exception_class: &str, exception_message: &str) -> FaultId {
        self.factory.compute_id(
            &self.project_name,
            exception_type,
            exception_class,
            exception_message,
        )
    }

    async fn load(&self, id: &FaultId) -> Result<Option<FaultRecord>, StoreError> {
        match self.kv.get(&id.key()).await? {
            Some(data) => Ok(Some(FaultRecord::from_json(&data)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, record: &FaultRecord) -> Result<(), StoreError> {
        let data = record.to_json()?;
        self.kv.set(&record.id().key(), &data, self.ttl).await?;
        self.kv.save().await?;
        Ok(())
    }

    async fn with_lock<T, F, Fut>(&self, id: FaultId, f: F) -> Result<T, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        let lock = self.locks.entry(id).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            f().await
        };
        drop(lock);

        // Only the map still holds it: nobody is waiting on this id
        self.locks.remove_if(&id, |_, l| Arc::strong_count(l) == 1);
        result
    }
}
