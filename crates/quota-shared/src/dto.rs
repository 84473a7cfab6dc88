//! Data Transfer Objects - payloads returned by the demo endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness report for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy(version: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: "Rate limiter service is healthy".to_string(),
            version: version.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Echo of who made a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl EchoResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            ip: None,
            token: None,
        }
    }

    pub fn with_caller(mut self, ip: impl Into<String>, token: Option<String>) -> Self {
        self.ip = Some(ip.into());
        self.token = token;
        self
    }
}

/// A single item of mock data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataItem {
    pub id: u32,
    pub name: String,
    pub value: u32,
}

/// Mock data listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub ip: String,
    pub token: String,
    pub data: Vec<DataItem>,
}
