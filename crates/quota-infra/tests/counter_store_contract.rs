//! Behaviour every `CounterStore` must share, checked against each backend.
//!
//! Redis cases connect to `REDIS_URL` (default `redis://localhost:6389`) and
//! return early when no server is reachable.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use quota_core::ports::CounterStore;
use quota_infra::InMemoryCounterStore;

const WINDOW: Duration = Duration::from_secs(60);

async fn assert_missing_keys_read_as_zero(store: &dyn CounterStore) {
    assert_eq!(store.get("contract:missing").await.unwrap(), 0);
    assert_eq!(store.ttl("contract:missing").await.unwrap(), Duration::ZERO);
}

async fn assert_increment_is_sequential(store: &dyn CounterStore) {
    for expected in 1..=3 {
        assert_eq!(store.increment("contract:seq", WINDOW).await.unwrap(), expected);
    }
    assert_eq!(store.get("contract:seq").await.unwrap(), 3);

    let ttl = store.ttl("contract:seq").await.unwrap();
    assert!(ttl > Duration::ZERO && ttl <= WINDOW, "ttl {ttl:?}");
}

async fn assert_set_overwrites(store: &dyn CounterStore) {
    store.increment("contract:set", Duration::from_secs(5)).await.unwrap();
    store.set("contract:set", 1, WINDOW).await.unwrap();

    assert_eq!(store.get("contract:set").await.unwrap(), 1);
    assert!(store.ttl("contract:set").await.unwrap() > Duration::from_secs(5));
}

async fn assert_concurrent_increments_are_distinct(store: Arc<dyn CounterStore>) {
    let results = join_all((0..50).map(|_| {
        let store = store.clone();
        async move { store.increment("contract:concurrent", WINDOW).await.unwrap() }
    }))
    .await;

    let mut counts = results;
    counts.sort_unstable();
    assert_eq!(counts, (1..=50).collect::<Vec<u64>>());
}

async fn assert_short_expiry_lapses(store: &dyn CounterStore) {
    store
        .set("contract:short", 1, Duration::from_millis(300))
        .await
        .unwrap();
    assert_eq!(store.get("contract:short").await.unwrap(), 1);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(store.get("contract:short").await.unwrap(), 0);
    assert_eq!(store.ttl("contract:short").await.unwrap(), Duration::ZERO);
}

async fn run_contract(store: Arc<dyn CounterStore>) {
    assert_missing_keys_read_as_zero(store.as_ref()).await;
    assert_increment_is_sequential(store.as_ref()).await;
    assert_set_overwrites(store.as_ref()).await;
    assert_concurrent_increments_are_distinct(store.clone()).await;
    assert_short_expiry_lapses(store.as_ref()).await;
    store.close().await.unwrap();
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_in_memory_store_contract() {
    run_contract(Arc::new(InMemoryCounterStore::new())).await;
}

#[cfg(feature = "redis")]
#[tokio::test]
async fn test_redis_store_contract() {
    use quota_infra::{RedisConfig, RedisCounterStore};

    let config = RedisConfig {
        url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6389".to_string()),
        connect_timeout: Duration::from_secs(1),
        key_prefix: format!("test_contract_{}", std::process::id()),
    };

    let store = match RedisCounterStore::new(config).await {
        Ok(store) => store,
        Err(_) => return,
    };

    run_contract(Arc::new(store)).await;
}
