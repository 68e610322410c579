use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Ok,
    Error,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Ok => write!(f, "OK"),
            HealthStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Outcome of probing the upstream log source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub message: String,
}

impl HealthCheckResult {
    pub fn ok() -> Self {
        Self {
            status: HealthStatus::Ok,
            message: "Data source is working".to_string(),
        }
    }

    pub fn error(source_name: &str) -> Self {
        Self {
            status: HealthStatus::Error,
            message: format!("Unable to communicate with {}", source_name),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}
