//! Redis counter store implementation.
//!
//! Increment runs as a single Lua script so the count and the window expiry
//! are applied atomically, even across many server instances sharing one
//! Redis. Expiry is delegated to Redis itself.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tokio::sync::RwLock;

use quota_core::error::StoreError;
use quota_core::ports::CounterStore;

/// Increment a counter and start its window if it has none.
/// Returns the post-increment count.
const INCREMENT_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if redis.call('PTTL', KEYS[1]) < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return current
"#;

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379/0)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Namespace prepended to every counter and block key
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            connect_timeout: Duration::from_secs(5),
            key_prefix: "ratelimit".to_string(),
        }
    }
}

/// Redis-backed counter store.
///
/// Uses a connection manager for automatic reconnection. The manager is
/// dropped on `close`, after which every operation reports the store as
/// unavailable.
pub struct RedisCounterStore {
    conn: RwLock<Option<ConnectionManager>>,
    config: RedisConfig,
    script: Script,
}

fn unavailable(err: redis::RedisError) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// Redis expiry arguments are whole milliseconds; never round a live key down to zero.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1)
}

impl RedisCounterStore {
    /// Connect and verify the server answers PING before returning.
    pub async fn new(config: RedisConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.as_str()).map_err(unavailable)?;

        // Use timeout to prevent hanging if Redis is unreachable
        let connect = async {
            let mut conn = ConnectionManager::new(client).await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(conn)
        };
        let conn = tokio::time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| StoreError::Unavailable("Connection timed out".to_string()))?
            .map_err(unavailable)?;

        tracing::info!(url = %config.url, prefix = %config.key_prefix, "Connected to Redis counter store");

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            config,
            script: Script::new(INCREMENT_SCRIPT),
        })
    }

    fn make_key(&self, key: &str) -> String {
        if self.config.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.config.key_prefix, key)
        }
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        self.conn
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::Unavailable("Connection closed".to_string()))
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        let value: Option<i64> = conn.get(self.make_key(key)).await.map_err(unavailable)?;
        Ok(value.unwrap_or(0).max(0) as u64)
    }

    async fn increment(&self, key: &str, window: Duration) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        let count: i64 = self
            .script
            .key(self.make_key(key))
            .arg(millis(window))
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(count.max(0) as u64)
    }

    async fn set(&self, key: &str, value: u64, expiry: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        conn.pset_ex::<_, _, ()>(self.make_key(key), value, millis(expiry))
            .await
            .map_err(unavailable)
    }

    async fn ttl(&self, key: &str) -> Result<Duration, StoreError> {
        let mut conn = self.connection().await?;
        // -2 for missing keys, -1 for keys without expiry
        let remaining: i64 = conn.pttl(self.make_key(key)).await.map_err(unavailable)?;
        Ok(Duration::from_millis(remaining.max(0) as u64))
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.conn.write().await.take().is_some() {
            tracing::info!(url = %self.config.url, "Redis counter store closed");
        }
        Ok(())
    }
}
