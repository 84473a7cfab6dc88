use chrono::{DateTime, Utc};

use super::LimitKind;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Requests left in the current window; zero when denied.
    pub remaining: u64,
    /// When the current window or block clears.
    pub reset_at: DateTime<Utc>,
    pub limit_kind: LimitKind,
    pub limit: u64,
}

impl Decision {
    pub fn allowed(
        remaining: u64,
        reset_at: DateTime<Utc>,
        limit_kind: LimitKind,
        limit: u64,
    ) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_at,
            limit_kind,
            limit,
        }
    }

    pub fn denied(reset_at: DateTime<Utc>, limit_kind: LimitKind, limit: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_at,
            limit_kind,
            limit,
        }
    }
}
