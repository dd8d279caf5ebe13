// Health Check Domain Model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single dependency check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// Check completed successfully
    Ok,
    /// Check completed and failed
    Error,
    /// Check did not complete before the deadline
    Indeterminate,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Ok => write!(f, "OK"),
            HealthStatus::Error => write!(f, "ERROR"),
            HealthStatus::Indeterminate => write!(f, "INDETERMINATE"),
        }
    }
}

/// One status per checked dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Storage connectivity
    pub storage_status: HealthStatus,
    /// Queue listing capability
    pub queue_status: HealthStatus,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.storage_status == HealthStatus::Ok && self.queue_status == HealthStatus::Ok
    }
}
