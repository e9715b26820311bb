//! In-process key-value backend

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::KvError;
use crate::kv::KvStore;

#[derive(Debug, Clone)]
struct KvEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl KvEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |exp| now < exp)
    }
}

/// Memory-backed store with per-key expiry
///
/// Cheap to clone; clones share the same data. `save` is a no-op that only
/// counts flushes.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    data: Arc<DashMap<String, KvEntry>>,
    saves: Arc<AtomicU64>,
}

impl MemoryKv {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.iter().filter(|e| e.is_live(now)).count()
    }

    /// Check if no live entries remain
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `save` calls so far
    #[inline]
    #[must_use]
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let now = Instant::now();
        if let Some(entry) = self.data.get(key) {
            if entry.is_live(now) {
                return Ok(Some(entry.value.clone()));
            }
        } else {
            return Ok(None);
        }

        // Expired: evict lazily
        self.data.remove_if(key, |_, entry| !entry.is_live(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), KvError> {
        // A ttl past the representable horizon never expires
        let expires_at = ttl.and_then(|d| Instant::now().checked_add(d));
        self.data.insert(
            key.to_string(),
            KvEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn save(&self) -> Result<(), KvError> {
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
