//! Counter store port.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::StoreError;

/// Counter store trait - abstraction over in-memory and Redis backends.
///
/// Keys expire lazily: once an entry's expiry has passed, every operation
/// behaves as if the key never existed.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current count for `key`, or 0 if absent or expired.
    async fn get(&self, key: &str) -> Result<u64, StoreError>;

    /// Atomically add one to `key` and return the new count.
    ///
    /// When the key has no expiry yet, it is set to `now + window` in the same
    /// atomic step. An existing expiry is left untouched, so windows are fixed
    /// from their first request.
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, StoreError>;

    /// Overwrite `key` with `value`, expiring `expiry` from now.
    async fn set(&self, key: &str, value: u64, expiry: Duration) -> Result<(), StoreError>;

    /// Time until `key` expires, zero if absent or expired.
    async fn ttl(&self, key: &str) -> Result<Duration, StoreError>;

    /// Release held connections. Safe to call more than once.
    async fn close(&self) -> Result<(), StoreError>;
}
