//! Rate decision engine.
//!
//! Turns a (subject, time) observation into an allow/deny [`Decision`] using
//! fixed windows counted in a [`CounterStore`]. A subject that exceeds its
//! window limit is blocked for the policy's block duration; the block record
//! is checked before the counter and takes precedence over it.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::{self, Clock, SystemClock};
use crate::domain::{Decision, LimitKind, Policy, SubjectKey, TokenPolicies};
use crate::error::RateLimitError;
use crate::ports::CounterStore;

/// Upper bound on a single decision's round trips to the counter store.
pub const DEFAULT_DECISION_TIMEOUT: Duration = Duration::from_secs(5);

/// Subject resolved from a request's IP and token.
#[derive(Debug)]
struct Subject {
    key: SubjectKey,
    policy: Policy,
    kind: LimitKind,
}

/// Rate decision engine.
///
/// Holds no mutable state once constructed; share it behind an `Arc`.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    ip_policy: Policy,
    token_policies: TokenPolicies,
    timeout: Duration,
}

impl RateLimiter {
    /// Create an engine applying `ip_policy` to every IP-identified subject.
    pub fn new(store: Arc<dyn CounterStore>, ip_policy: Policy) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            ip_policy,
            token_policies: TokenPolicies::new(),
            timeout: DEFAULT_DECISION_TIMEOUT,
        }
    }

    pub fn with_token_policies(mut self, token_policies: TokenPolicies) -> Self {
        self.token_policies = token_policies;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a policy for requests bearing exactly `token`.
    pub fn register_token_policy(&mut self, token: impl Into<String>, policy: Policy) {
        self.token_policies.insert(token, policy);
    }

    pub fn ip_policy(&self) -> &Policy {
        &self.ip_policy
    }

    pub fn token_policies(&self) -> &TokenPolicies {
        &self.token_policies
    }

    /// Decide whether a request from `ip`, optionally carrying `token`, is allowed.
    ///
    /// Any counter store failure, or the decision exceeding its timeout, is
    /// returned as an error and must not be treated as allow or deny.
    pub async fn check_limit(
        &self,
        ip: &str,
        token: Option<&str>,
    ) -> Result<Decision, RateLimitError> {
        let subject = self.resolve(ip, token);

        tokio::time::timeout(self.timeout, self.check_subject(&subject))
            .await
            .map_err(|_| RateLimitError::Timeout(self.timeout))?
    }

    /// A registered, non-empty token wins; anything else falls back to the IP.
    fn resolve(&self, ip: &str, token: Option<&str>) -> Subject {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            if let Some(policy) = self.token_policies.get(token) {
                return Subject {
                    key: SubjectKey::token(token),
                    policy: *policy,
                    kind: LimitKind::Token,
                };
            }
        }

        Subject {
            key: SubjectKey::ip(ip),
            policy: self.ip_policy,
            kind: LimitKind::Ip,
        }
    }

    async fn check_subject(&self, subject: &Subject) -> Result<Decision, RateLimitError> {
        let Subject { key, policy, kind } = subject;
        let blocked_key = key.blocked();

        let blocked = self
            .store
            .get(&blocked_key)
            .await
            .map_err(RateLimitError::BlockLookup)?;

        if blocked > 0 {
            let ttl = self
                .store
                .ttl(&blocked_key)
                .await
                .map_err(RateLimitError::BlockTtl)?;

            tracing::debug!(subject = %key, ttl_ms = ttl.as_millis() as u64, "Subject is blocked");
            let reset_at = clock::after(self.clock.now(), ttl);
            return Ok(Decision::denied(reset_at, *kind, policy.limit()));
        }

        let count = self
            .store
            .increment(key.as_str(), policy.window())
            .await
            .map_err(RateLimitError::Increment)?;

        if count > policy.limit() {
            let block_duration = policy.block_duration();
            if !block_duration.is_zero() {
                self.store
                    .set(&blocked_key, 1, block_duration)
                    .await
                    .map_err(RateLimitError::Block)?;
            }

            tracing::warn!(
                subject = %key,
                limit = policy.limit(),
                block_secs = block_duration.as_secs(),
                "Rate limit exceeded, blocking subject"
            );
            let reset_at = clock::after(self.clock.now(), block_duration);
            return Ok(Decision::denied(reset_at, *kind, policy.limit()));
        }

        let ttl = self
            .store
            .ttl(key.as_str())
            .await
            .map_err(RateLimitError::CounterTtl)?;

        let remaining = policy.limit().saturating_sub(count);
        let reset_at = clock::after(self.clock.now(), ttl);
        Ok(Decision::allowed(remaining, reset_at, *kind, policy.limit()))
    }
}
