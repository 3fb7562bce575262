use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

// ============================================================================
// Health Check Abstractions
// ============================================================================
//
// The service has one dependency worth probing: the order store. A component
// is either reachable or not; the HTTP layer maps that to 200 or 503.
//
// ============================================================================

pub const SERVICE_NAME: &str = "order-service";

/// Health status of a component
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Health information for a component
#[derive(Debug, Clone)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            last_check: Utc::now(),
        }
    }

    /// Body served by `/health`. Failure detail stays in the logs; callers
    /// only learn which component is down.
    pub fn to_report(&self) -> Value {
        match &self.status {
            HealthStatus::Healthy => {
                let mut report = json!({
                    "status": "healthy",
                    "service": SERVICE_NAME,
                    "timestamp": self.last_check.to_rfc3339_opts(SecondsFormat::Secs, true),
                });
                report[self.name.as_str()] = json!("connected");
                report
            }
            HealthStatus::Unhealthy(_) => json!({
                "status": "unhealthy",
                "service": SERVICE_NAME,
                "error": format!("{} connection failed", self.name),
            }),
        }
    }
}
