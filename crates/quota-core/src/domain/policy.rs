use std::collections::HashMap;
use std::time::Duration;

use crate::error::DomainError;

/// Rate limit policy - how many requests a subject may make per window and
/// how long it stays blocked after exceeding that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    limit: u64,
    window: Duration,
    block_duration: Duration,
}

impl Policy {
    /// Create a validated policy.
    ///
    /// `limit` and `window` must be non-zero. A zero `block_duration` is
    /// allowed and means violators are denied without being blocked.
    pub fn new(limit: u64, window: Duration, block_duration: Duration) -> Result<Self, DomainError> {
        if limit == 0 {
            return Err(DomainError::InvalidPolicy(
                "limit must be greater than zero".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(DomainError::InvalidPolicy(
                "window must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            limit,
            window,
            block_duration,
        })
    }

    /// Maximum requests allowed per window (inclusive).
    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn block_duration(&self) -> Duration {
        self.block_duration
    }
}

/// Per-token policy overrides, keyed by the exact token string.
#[derive(Debug, Clone, Default)]
pub struct TokenPolicies {
    policies: HashMap<String, Policy>,
}

impl TokenPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `policy` for `token`, replacing any previous entry.
    /// Empty tokens never identify a subject and are ignored.
    pub fn insert(&mut self, token: impl Into<String>, policy: Policy) {
        let token = token.into();
        if token.is_empty() {
            tracing::warn!("Ignoring policy registered for an empty token");
            return;
        }
        self.policies.insert(token, policy);
    }

    pub fn get(&self, token: &str) -> Option<&Policy> {
        self.policies.get(token)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Policy)> {
        self.policies.iter().map(|(token, policy)| (token.as_str(), policy))
    }
}

impl FromIterator<(String, Policy)> for TokenPolicies {
    fn from_iter<I: IntoIterator<Item = (String, Policy)>>(iter: I) -> Self {
        let mut policies = Self::new();
        for (token, policy) in iter {
            policies.insert(token, policy);
        }
        policies
    }
}
