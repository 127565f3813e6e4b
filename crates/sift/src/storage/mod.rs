//! Keyed durable storage.
//!
//! The persisted layout is deliberately small: a handful of named
//! entries (the session collection, the current-session pointer), each
//! stored as one string value under one key.

mod error;
mod fs;
mod memory;

pub use error::{StorageError, StorageResult};
pub use fs::FsStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

/// Durable keyed string storage.
///
/// Implementations provide whole-value reads and writes; callers own
/// serialization. Absent keys read as `None` rather than erroring.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove the value stored under `key`. Absent keys are a no-op.
    async fn remove(&self, key: &str) -> StorageResult<()>;
}
