//! In-memory counter store - used for tests and single-instance deployments.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use quota_core::clock::{self, Clock, SystemClock};
use quota_core::error::StoreError;
use quota_core::ports::CounterStore;

struct CounterEntry {
    count: u64,
    expires_at: DateTime<Utc>,
}

impl CounterEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-memory counter store using a HashMap behind an async mutex.
///
/// Every operation holds the lock for its whole read-modify-write, which is
/// what makes `increment` atomic. Expired entries are removed lazily when
/// touched.
/// Note: Counts are per-process and lost on restart.
pub struct InMemoryCounterStore {
    entries: Mutex<HashMap<String, CounterEntry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of stored entries, including expired ones not yet removed.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Look up `key`, dropping it first if it has expired.
fn live_entry<'a>(
    entries: &'a mut HashMap<String, CounterEntry>,
    key: &str,
    now: DateTime<Utc>,
) -> Option<&'a mut CounterEntry> {
    if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
        entries.remove(key);
        return None;
    }
    entries.get_mut(key)
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, key: &str) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock().await;
        let now = self.clock.now();

        Ok(live_entry(&mut entries, key, now).map_or(0, |entry| entry.count))
    }

    async fn increment(&self, key: &str, window: Duration) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock().await;
        let now = self.clock.now();

        if let Some(entry) = live_entry(&mut entries, key, now) {
            entry.count += 1;
            return Ok(entry.count);
        }

        // First request of a window fixes its expiry.
        entries.insert(
            key.to_string(),
            CounterEntry {
                count: 1,
                expires_at: clock::after(now, window),
            },
        );
        Ok(1)
    }

    async fn set(&self, key: &str, value: u64, expiry: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let now = self.clock.now();

        entries.insert(
            key.to_string(),
            CounterEntry {
                count: value,
                expires_at: clock::after(now, expiry),
            },
        );
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Duration, StoreError> {
        let mut entries = self.entries.lock().await;
        let now = self.clock.now();

        Ok(live_entry(&mut entries, key, now)
            .map_or(Duration::ZERO, |entry| clock::until(now, entry.expires_at)))
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        let dropped = entries.len();
        entries.clear();
        tracing::debug!(dropped, "In-memory counter store closed");
        Ok(())
    }
}
