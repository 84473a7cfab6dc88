//! # Quota Core
//!
//! The domain layer of Quota Guard.
//! This crate contains the rate decision engine and the counter store port it
//! depends on. Concrete stores live in `quota-infra`.

pub mod clock;
pub mod domain;
pub mod error;
pub mod limiter;
pub mod ports;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{Decision, LimitKind, Policy, SubjectKey, TokenPolicies};
pub use error::{DomainError, RateLimitError, StoreError};
pub use limiter::RateLimiter;
