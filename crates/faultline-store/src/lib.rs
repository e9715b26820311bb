//! Faultline Store
//!
//! Deduplicating persistence for fault records.
//!
//! - [`KvStore`]: narrow get/set/save contract for the backing store
//! - [`MemoryKv`]: in-process backend with per-key expiry
//! - `RedisKv`: Redis backend (feature `redis`)
//! - [`FaultStore`]: find-by-id, find-by-identity, and store-with-increment
//!
//! # Example
//!
//! ```rust,ignore
//! use faultline_store::{FaultStore, MemoryKv};
//!
//! let store = FaultStore::new("billing", Arc::new(MemoryKv::new()));
//! let id = store.store(record).await?;
//! let stored = store.get(&id).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod kv;
mod memory;
#[cfg(feature = "redis")]
mod redis_kv;
mod repository;

pub use error::{KvError, StoreError};
pub use kv::KvStore;
pub use memory::MemoryKv;
#[cfg(feature = "redis")]
pub use redis_kv::RedisKv;
pub use repository::FaultStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
