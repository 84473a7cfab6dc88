use std::fmt;

use serde::{Deserialize, Serialize};

/// Which kind of identity a decision was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitKind {
    Ip,
    Token,
}

impl LimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::Ip => "ip",
            LimitKind::Token => "token",
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counter store key identifying a rate limited subject.
///
/// Formatted as `ip:<address>` or `token:<value>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectKey(String);

impl SubjectKey {
    pub fn ip(address: &str) -> Self {
        Self(format!("ip:{address}"))
    }

    pub fn token(token: &str) -> Self {
        Self(format!("token:{token}"))
    }

    /// Key of the block record, kept apart from the counter.
    pub fn blocked(&self) -> String {
        format!("blocked:{}", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
