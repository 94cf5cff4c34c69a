//! Keyed record store
//!
//! Sessions are persisted as opaque JSON blobs under a string key with a
//! per-key expiration. The store never interprets record structure and offers
//! no partial-field updates: all merge logic belongs to the session engine.
//!
//! The one conditional primitive, [`RecordStore::set_if_not_exists`], is what
//! the session lock is built on.

use async_trait::async_trait;
use std::time::Duration;

use crate::Result;

mod memory;
#[cfg(feature = "sqlx")]
mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlx")]
pub use sqlite::SqliteStore;

/// Key prefix for session records
pub const SESSION_KEY_PREFIX: &str = "session:";

/// Key prefix for lock entries, namespaced apart from session records
pub const LOCK_KEY_PREFIX: &str = "lock:";

/// Store key holding the session record for `token`
pub fn session_key(token: &str) -> String {
    format!("{}{}", SESSION_KEY_PREFIX, token)
}

/// Store key holding the lock for `token`
pub fn lock_key(token: &str) -> String {
    format!("{}{}", LOCK_KEY_PREFIX, token)
}

/// Key/value store with per-key TTL
///
/// Expired keys behave exactly like missing keys for every operation.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the value stored under `key`, if present and not expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value and TTL
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Remove `key` (no error if absent)
    async fn delete(&self, key: &str) -> Result<()>;

    /// True when `key` holds a live value
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Atomically store `value` only if `key` holds no live value
    ///
    /// Returns `true` when this call stored the value.
    async fn set_if_not_exists(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Remove `key` only while it still holds `expected`
    ///
    /// The default reads, compares and deletes in separate calls; backends
    /// with a native compare-and-delete should override it.
    async fn delete_if_value(&self, key: &str, expected: &str) -> Result<bool> {
        match self.get(key).await? {
            Some(current) if current == expected => {
                self.delete(key).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
