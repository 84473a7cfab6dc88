//! Rate decision engine driven end to end through the in-memory store, with a
//! manual clock standing in for real time.

use std::sync::Arc;
use std::time::Duration;

use quota_core::clock::{self, Clock, ManualClock};
use quota_core::{LimitKind, Policy, RateLimiter, TokenPolicies};
use quota_infra::InMemoryCounterStore;

fn policy(limit: u64, window_secs: u64, block_secs: u64) -> Policy {
    Policy::new(
        limit,
        Duration::from_secs(window_secs),
        Duration::from_secs(block_secs),
    )
    .unwrap()
}

fn limiter(ip_policy: Policy) -> (RateLimiter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(InMemoryCounterStore::with_clock(clock.clone()));
    let limiter = RateLimiter::new(store, ip_policy).with_clock(clock.clone());
    (limiter, clock)
}

#[tokio::test]
async fn test_ip_limit_counts_down_then_denies() {
    let (limiter, clock) = limiter(policy(3, 1, 60));

    for expected_remaining in [2, 1, 0] {
        let decision = limiter.check_limit("1.2.3.4", None).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, expected_remaining);
        assert_eq!(decision.limit, 3);
        assert_eq!(decision.limit_kind, LimitKind::Ip);
        assert_eq!(decision.reset_at, clock::after(clock.now(), Duration::from_secs(1)));
    }

    let decision = limiter.check_limit("1.2.3.4", None).await.unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.remaining, 0);
    assert_eq!(decision.limit_kind, LimitKind::Ip);
    assert_eq!(decision.reset_at, clock::after(clock.now(), Duration::from_secs(60)));
}

#[tokio::test]
async fn test_block_outlives_window() {
    let (limiter, clock) = limiter(policy(3, 1, 60));

    for _ in 0..4 {
        limiter.check_limit("1.2.3.4", None).await.unwrap();
    }

    // The window would have reset long ago; the block must still hold.
    clock.advance(Duration::from_secs(30));
    let decision = limiter.check_limit("1.2.3.4", None).await.unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.reset_at, clock::after(clock.now(), Duration::from_secs(30)));

    clock.advance(Duration::from_secs(30));
    let decision = limiter.check_limit("1.2.3.4", None).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 2);
}

#[tokio::test]
async fn test_window_reset_restores_quota() {
    let (limiter, clock) = limiter(policy(2, 10, 60));

    limiter.check_limit("1.2.3.4", None).await.unwrap();
    clock.advance(Duration::from_secs(6));
    let decision = limiter.check_limit("1.2.3.4", None).await.unwrap();
    assert_eq!(decision.remaining, 0);
    // Fixed window: the second request did not push the reset back.
    assert_eq!(decision.reset_at, clock::after(clock.now(), Duration::from_secs(4)));

    clock.advance(Duration::from_secs(4));
    let decision = limiter.check_limit("1.2.3.4", None).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 1);
}

#[tokio::test]
async fn test_registered_token_is_independent_of_exhausted_ip() {
    let (mut limiter, _clock) = limiter(policy(2, 1, 60));
    limiter.register_token_policy("vip", policy(10, 1, 60));

    let first = limiter.check_limit("10.0.0.1", None).await.unwrap();
    let second = limiter.check_limit("10.0.0.1", None).await.unwrap();
    let third = limiter.check_limit("10.0.0.1", None).await.unwrap();
    assert!(first.allowed && second.allowed);
    assert!(!third.allowed);
    assert_eq!(third.limit_kind, LimitKind::Ip);

    let decision = limiter.check_limit("10.0.0.2", Some("vip")).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.limit_kind, LimitKind::Token);
    assert_eq!(decision.remaining, 9);

    // Same token from the exhausted IP still uses the token's quota.
    let decision = limiter.check_limit("10.0.0.1", Some("vip")).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 8);
}

#[tokio::test]
async fn test_token_limit_blocks_token() {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(InMemoryCounterStore::with_clock(clock.clone()));
    let tokens: TokenPolicies = [("abc123".to_string(), policy(5, 1, 60))]
        .into_iter()
        .collect();
    let limiter = RateLimiter::new(store, policy(3, 1, 60))
        .with_token_policies(tokens)
        .with_clock(clock);

    for expected_remaining in (0..5).rev() {
        let decision = limiter.check_limit("192.168.1.1", Some("abc123")).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, expected_remaining);
    }

    let decision = limiter.check_limit("192.168.1.1", Some("abc123")).await.unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.limit_kind, LimitKind::Token);

    // The IP itself is untouched by the token's block.
    let decision = limiter.check_limit("192.168.1.1", None).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.remaining, 2);
}

#[tokio::test]
async fn test_unregistered_token_falls_back_to_ip() {
    let (limiter, _clock) = limiter(policy(3, 1, 60));

    let decision = limiter.check_limit("1.2.3.4", Some("ghost")).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.limit_kind, LimitKind::Ip);

    // Shares the IP counter with token-less requests.
    let decision = limiter.check_limit("1.2.3.4", None).await.unwrap();
    assert_eq!(decision.remaining, 1);
}

#[tokio::test]
async fn test_distinct_ips_have_independent_counters() {
    let (limiter, _clock) = limiter(policy(2, 1, 60));

    for ip in ["192.168.1.1", "192.168.1.2", "192.168.1.3"] {
        assert!(limiter.check_limit(ip, None).await.unwrap().allowed);
        assert!(limiter.check_limit(ip, None).await.unwrap().allowed);
        assert!(!limiter.check_limit(ip, None).await.unwrap().allowed, "{ip}");
    }
}

#[tokio::test]
async fn test_engines_with_separate_policies_share_a_store() {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(InMemoryCounterStore::with_clock(clock.clone()));
    let strict = RateLimiter::new(store.clone(), policy(1, 1, 60)).with_clock(clock.clone());
    let mut lenient = RateLimiter::new(store, policy(100, 1, 60)).with_clock(clock);
    lenient.register_token_policy("vip", policy(100, 1, 60));

    assert!(strict.token_policies().is_empty());
    assert_eq!(lenient.token_policies().len(), 1);

    assert!(strict.check_limit("1.2.3.4", None).await.unwrap().allowed);
    assert!(!strict.check_limit("1.2.3.4", None).await.unwrap().allowed);
    // Block records live in the shared store, whichever engine wrote them.
    assert!(!lenient.check_limit("1.2.3.4", None).await.unwrap().allowed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_never_exceed_limit() {
    let limiter = Arc::new(RateLimiter::new(
        Arc::new(InMemoryCounterStore::new()),
        policy(50, 60, 60),
    ));

    let handles: Vec<_> = (0..200)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.check_limit("1.2.3.4", None).await.unwrap() })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap().allowed {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 50);
}
