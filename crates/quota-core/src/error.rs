//! Domain-level error types.

use std::time::Duration;

use thiserror::Error;

/// Domain errors - invalid configuration of the rate limiting domain.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),
}

/// Counter store errors.
///
/// The in-memory store never produces these; the networked store reports
/// every connection or command failure as `Unavailable`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a single rate limit decision.
///
/// Every variant is terminal for the request being decided. None of them may
/// be interpreted as "allowed" or "denied".
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("failed to check blocked status: {0}")]
    BlockLookup(#[source] StoreError),

    #[error("failed to get block TTL: {0}")]
    BlockTtl(#[source] StoreError),

    #[error("failed to increment counter: {0}")]
    Increment(#[source] StoreError),

    #[error("failed to set block: {0}")]
    Block(#[source] StoreError),

    #[error("failed to get TTL: {0}")]
    CounterTtl(#[source] StoreError),

    #[error("rate limit decision timed out after {0:?}")]
    Timeout(Duration),
}
