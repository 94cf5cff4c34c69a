//! Distributed session lock
//!
//! Short-lived mutual exclusion keyed by session token, built on the record
//! store's conditional set so it holds across processes sharing one store.
//!
//! **Algorithm:**
//! 1. Generate a random holder id
//! 2. `set_if_not_exists("lock:<token>", holder_id, ttl)`
//! 3. On success: run the critical section, then delete the lock only if it
//!    still holds `holder_id` (after TTL expiry another holder may own it)
//! 4. On failure: sleep `retry_delay`, retry up to `max_retries` attempts
//! 5. Exhausted: return [`Error::Busy`]
//!
//! The lock TTL bounds how long a crashed holder can block a session; the
//! retry budget (20 × 250 ms by default) bounds how long a caller waits.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{lock_key, RecordStore};
use crate::{Error, Result};

/// Retry and expiry tuning for [`SessionLock`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// Acquisition attempts before giving up
    pub max_retries: u32,
    /// Pause between attempts, in milliseconds
    pub retry_delay_ms: u64,
    /// Lock entry lifetime, in seconds
    pub ttl_seconds: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            max_retries: 20,
            retry_delay_ms: 250,
            ttl_seconds: 10,
        }
    }
}

impl LockSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Proof of a held lock, consumed on release
#[derive(Debug)]
struct LockGuard {
    key: String,
    holder_id: String,
}

/// Per-session lock over a shared [`RecordStore`]
#[derive(Clone)]
pub struct SessionLock {
    store: Arc<dyn RecordStore>,
    settings: LockSettings,
}

impl SessionLock {
    pub fn new(store: Arc<dyn RecordStore>, settings: LockSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    /// Run `critical` while holding the lock for `token`
    ///
    /// The critical section's own result is returned unchanged; a failure to
    /// release afterwards is logged and left to the lock TTL.
    pub async fn with_lock<T, F, Fut>(&self, token: &str, critical: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let guard = self.acquire(token).await?;
        let result = critical().await;
        self.release(guard).await;
        result
    }

    async fn acquire(&self, token: &str) -> Result<LockGuard> {
        let key = lock_key(token);
        let holder_id = Uuid::new_v4().to_string();
        let start_time = Instant::now();
        let max_attempts = self.settings.max_retries.max(1);

        for attempt in 1..=max_attempts {
            if self
                .store
                .set_if_not_exists(&key, &holder_id, self.settings.ttl())
                .await?
            {
                if attempt > 1 {
                    tracing::debug!(
                        token,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis(),
                        "Session lock acquired after retry"
                    );
                }
                return Ok(LockGuard { key, holder_id });
            }

            if attempt < max_attempts {
                tracing::debug!(
                    token,
                    attempt,
                    retry_delay_ms = self.settings.retry_delay_ms,
                    "Session lock held elsewhere, will retry"
                );
                tokio::time::sleep(self.settings.retry_delay()).await;
            }
        }

        tracing::error!(
            token,
            attempts = max_attempts,
            elapsed_ms = start_time.elapsed().as_millis(),
            "Session lock not acquired: retry budget exhausted"
        );
        Err(Error::Busy {
            token: token.to_string(),
            attempts: max_attempts,
        })
    }

    async fn release(&self, guard: LockGuard) {
        match self.store.delete_if_value(&guard.key, &guard.holder_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    key = %guard.key,
                    "Session lock expired before release; left to current holder"
                );
            }
            Err(e) => {
                tracing::warn!(
                    key = %guard.key,
                    error = %e,
                    "Failed to release session lock; it will expire by TTL"
                );
            }
        }
    }
}
