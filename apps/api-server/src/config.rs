//! Application configuration loaded from environment variables.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use actix_web::http::header::HeaderName;
use quota_core::limiter::DEFAULT_DECISION_TIMEOUT;
use quota_core::{DomainError, Policy, TokenPolicies};
use thiserror::Error;

/// Configuration errors - the server refuses to start on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}: invalid number {value:?}")]
    InvalidNumber { key: String, value: String },

    #[error("{key}: invalid duration {value:?}")]
    InvalidDuration { key: String, value: String },

    #[error("{key}: {source}")]
    InvalidPolicy { key: String, source: DomainError },

    #[error("STORAGE_BACKEND: unknown backend {0:?} (expected \"redis\" or \"memory\")")]
    UnknownBackend(String),

    #[error("API_KEY_HEADER: invalid header name {0:?}")]
    InvalidHeader(String),

    #[error("RATE_LIMIT_TIMEOUT_MS: must be greater than zero")]
    ZeroTimeout,
}

/// Where request counters are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Shared Redis instance, for multi-instance deployments.
    Redis {
        url: String,
        connect_timeout: Duration,
        key_prefix: String,
    },
    /// Per-process counters.
    Memory,
}

impl StorageConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StorageConfig::Redis { .. } => "redis",
            StorageConfig::Memory => "memory",
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageConfig,
    /// Policy applied to every IP-identified caller.
    pub ip_policy: Policy,
    /// Policies for callers presenting one of these exact tokens.
    pub token_policies: TokenPolicies,
    /// Request header carrying the caller's token.
    pub api_key_header: HeaderName,
    pub decision_timeout: Duration,
}

/// Environment snapshot with typed, defaulted lookups.
/// Empty values count as unset.
struct Vars(HashMap<String, String>);

impl Vars {
    fn raw(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.raw(key).unwrap_or(default).to_string()
    }

    fn number<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.raw(key) {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidNumber {
                key: key.to_string(),
                value: value.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn duration(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        match self.raw(key) {
            Some(value) => parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
                key: key.to_string(),
                value: value.to_string(),
            }),
            None => Ok(default),
        }
    }

    /// Policy from `<prefix>_LIMIT`, `<prefix>_WINDOW` and `<prefix>_BLOCK_TIME`.
    fn policy(
        &self,
        prefix: &str,
        defaults: (u64, Duration, Duration),
    ) -> Result<Policy, ConfigError> {
        let (limit, window, block) = defaults;
        let limit = self.number(&format!("{prefix}_LIMIT"), limit)?;
        let window = self.duration(&format!("{prefix}_WINDOW"), window)?;
        let block = self.duration(&format!("{prefix}_BLOCK_TIME"), block)?;

        Policy::new(limit, window, block).map_err(|source| ConfigError::InvalidPolicy {
            key: prefix.to_string(),
            source,
        })
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(env::vars())
    }

    /// Build configuration from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars = Vars(vars.into_iter().collect());

        let storage = match vars.string("STORAGE_BACKEND", "redis").to_lowercase().as_str() {
            "redis" => StorageConfig::Redis {
                url: vars.string("REDIS_URL", "redis://localhost:6379/0"),
                connect_timeout: Duration::from_secs(
                    vars.number("REDIS_CONNECT_TIMEOUT_SECS", 5)?,
                ),
                key_prefix: vars.string("RATE_LIMIT_KEY_PREFIX", "ratelimit"),
            },
            "memory" => StorageConfig::Memory,
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        // IP_RATE_LIMIT, IP_RATE_WINDOW, IP_BLOCK_TIME
        let ip_limit = vars.number("IP_RATE_LIMIT", 10)?;
        let ip_window = vars.duration("IP_RATE_WINDOW", Duration::from_secs(1))?;
        let ip_block = vars.duration("IP_BLOCK_TIME", Duration::from_secs(300))?;
        let ip_policy = Policy::new(ip_limit, ip_window, ip_block).map_err(|source| {
            ConfigError::InvalidPolicy {
                key: "IP".to_string(),
                source,
            }
        })?;

        // Defaults for fields a TOKEN_<name>_* group leaves out
        let token_defaults = (
            vars.number("TOKEN_RATE_LIMIT", 100)?,
            vars.duration("TOKEN_RATE_WINDOW", Duration::from_secs(1))?,
            vars.duration("TOKEN_BLOCK_TIME", Duration::from_secs(300))?,
        );

        let mut token_policies = TokenPolicies::new();
        for name in token_names(&vars) {
            let policy = vars.policy(&format!("TOKEN_{name}"), token_defaults)?;
            token_policies.insert(name, policy);
        }

        let header = vars.string("API_KEY_HEADER", "API_KEY");
        let api_key_header = HeaderName::from_str(&header)
            .map_err(|_| ConfigError::InvalidHeader(header.clone()))?;

        let decision_timeout = Duration::from_millis(vars.number(
            "RATE_LIMIT_TIMEOUT_MS",
            DEFAULT_DECISION_TIMEOUT.as_millis() as u64,
        )?);
        if decision_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(Self {
            host: vars.string("HOST", "0.0.0.0"),
            port: vars.number("PORT", 8080)?,
            storage,
            ip_policy,
            token_policies,
            api_key_header,
            decision_timeout,
        })
    }
}

/// Tokens declared through `TOKEN_<name>_LIMIT`, sorted.
/// `TOKEN_RATE_LIMIT` is the default limit, not a token named `RATE`.
fn token_names(vars: &Vars) -> Vec<String> {
    let mut names: Vec<String> = vars
        .0
        .keys()
        .filter(|key| key.as_str() != "TOKEN_RATE_LIMIT")
        .filter_map(|key| key.strip_prefix("TOKEN_")?.strip_suffix("_LIMIT"))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    names.sort();
    names
}

/// Parse `500ms`, `1s`, `5m`, `1h`, compounds like `1m30s`, or bare seconds (`1.5`).
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if let Ok(secs) = input.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let unit_len = rest[number_len..]
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len() - number_len);

        let number = &rest[..number_len];
        let unit_nanos: u64 = match &rest[number_len..number_len + unit_len] {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return None,
        };

        let segment = match number.parse::<u64>() {
            Ok(whole) => Duration::from_nanos(whole.checked_mul(unit_nanos)?),
            Err(_) => {
                let fractional: f64 = number.parse().ok()?;
                Duration::try_from_secs_f64(fractional * unit_nanos as f64 / 1e9).ok()?
            }
        };
        total = total.checked_add(segment)?;
        rest = &rest[number_len + unit_len..];
    }

    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        AppConfig::from_vars(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.storage.name(), "redis");
        assert_eq!(config.ip_policy.limit(), 10);
        assert_eq!(config.ip_policy.window(), Duration::from_secs(1));
        assert_eq!(config.ip_policy.block_duration(), Duration::from_secs(300));
        assert!(config.token_policies.is_empty());
        assert_eq!(config.api_key_header.as_str(), "api_key");
        assert_eq!(config.decision_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_ip_policy_from_env() {
        let config = config(&[
            ("IP_RATE_LIMIT", "3"),
            ("IP_RATE_WINDOW", "500ms"),
            ("IP_BLOCK_TIME", "1m30s"),
            ("STORAGE_BACKEND", "memory"),
        ])
        .unwrap();

        assert_eq!(config.storage, StorageConfig::Memory);
        assert_eq!(config.ip_policy.limit(), 3);
        assert_eq!(config.ip_policy.window(), Duration::from_millis(500));
        assert_eq!(config.ip_policy.block_duration(), Duration::from_secs(90));
    }

    #[test]
    fn test_token_policies_use_token_defaults() {
        let config = config(&[
            ("TOKEN_RATE_LIMIT", "50"),
            ("TOKEN_BLOCK_TIME", "2m"),
            ("TOKEN_abc123_LIMIT", "5"),
            ("TOKEN_abc123_WINDOW", "2s"),
            ("TOKEN_team_ops_LIMIT", "20"),
            ("TOKEN_team_ops_BLOCK_TIME", "10"),
        ])
        .unwrap();

        assert_eq!(config.token_policies.len(), 2);
        assert!(config.token_policies.get("RATE").is_none());

        let abc = config.token_policies.get("abc123").unwrap();
        assert_eq!(abc.limit(), 5);
        assert_eq!(abc.window(), Duration::from_secs(2));
        assert_eq!(abc.block_duration(), Duration::from_secs(120));

        let ops = config.token_policies.get("team_ops").unwrap();
        assert_eq!(ops.limit(), 20);
        assert_eq!(ops.window(), Duration::from_secs(1));
        assert_eq!(ops.block_duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            config(&[("IP_RATE_LIMIT", "ten")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            config(&[("IP_RATE_WINDOW", "soon")]),
            Err(ConfigError::InvalidDuration { .. })
        ));
        assert!(matches!(
            config(&[("TOKEN_vip_LIMIT", "0")]),
            Err(ConfigError::InvalidPolicy { .. })
        ));
        assert!(matches!(
            config(&[("STORAGE_BACKEND", "etcd")]),
            Err(ConfigError::UnknownBackend(_))
        ));
        assert!(matches!(
            config(&[("RATE_LIMIT_TIMEOUT_MS", "0")]),
            Err(ConfigError::ZeroTimeout)
        ));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1s"), Some(Duration::from_secs(1)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("1.5"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("42"), Some(Duration::from_secs(42)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("10 parsecs"), None);
        assert_eq!(parse_duration("-1"), None);
    }
}
