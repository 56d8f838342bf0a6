//! Health-check wire contract.
//!
//! Every monitored service answers `GET <health_path>` with a JSON object:
//!
//! ```json
//! { "status": "UP", "service": "image-server", "timestamp": "2024-01-01T00:00:00Z",
//!   "details": { "uptime": 42 } }
//! ```
//!
//! `status` is `UP` or `DOWN`; a `DOWN` payload may carry an `error` string.
//! Anything else is a protocol failure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::health::probe::ProbeError;

/// Status tag reported by a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    Up,
    Down,
}

/// Parsed health-check response body.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HealthPayload {
    pub status: ServiceStatus,
    pub service: String,
    /// ISO-8601 timestamp as sent by the service.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthPayload {
    pub fn is_up(&self) -> bool {
        self.status == ServiceStatus::Up
    }
}

/// Result of one probe attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum HealthCheckOutcome {
    /// The service answered with a well-formed payload (UP or DOWN).
    Reported(HealthPayload),
    /// No usable payload was obtained.
    Failed(ProbeError),
}

impl HealthCheckOutcome {
    /// Only a reported UP counts as success.
    pub fn is_success(&self) -> bool {
        matches!(self, HealthCheckOutcome::Reported(p) if p.is_up())
    }

    pub fn payload(&self) -> Option<&HealthPayload> {
        match self {
            HealthCheckOutcome::Reported(p) => Some(p),
            HealthCheckOutcome::Failed(_) => None,
        }
    }

    /// Human readable reason for a failed outcome, `None` on success.
    pub fn failure_message(&self) -> Option<String> {
        match self {
            HealthCheckOutcome::Reported(p) if p.is_up() => None,
            HealthCheckOutcome::Reported(p) => Some(match &p.error {
                Some(detail) => format!("Service reported DOWN status: {}", detail),
                None => "Service reported DOWN status".to_string(),
            }),
            HealthCheckOutcome::Failed(e) => Some(e.to_string()),
        }
    }

    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            HealthCheckOutcome::Reported(p) if p.is_up() => "up",
            HealthCheckOutcome::Reported(_) => "down",
            HealthCheckOutcome::Failed(e) => e.label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_minimal_payload() {
        let p: HealthPayload = serde_json::from_str(
            r#"{"status":"UP","service":"image-server","timestamp":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert!(p.is_up());
        assert!(p.details.is_none());
    }

    #[test]
    fn test_parse_down_with_details() {
        let p: HealthPayload = serde_json::from_str(
            r#"{"status":"DOWN","service":"fs","timestamp":"t","details":{"disk":"full"},"error":"no space"}"#,
        )
        .unwrap();
        assert_eq!(p.status, ServiceStatus::Down);
        assert_eq!(p.details.unwrap()["disk"], "full");
        assert_eq!(p.error.as_deref(), Some("no space"));
    }

    #[test]
    fn test_shape_mismatches_are_rejected() {
        // Express-style `OK` is not part of the contract
        assert!(serde_json::from_str::<HealthPayload>(
            r#"{"status":"OK","service":"x","timestamp":"t"}"#
        )
        .is_err());
        assert!(serde_json::from_str::<HealthPayload>(r#"{"status":"UP","timestamp":"t"}"#).is_err());
        assert!(serde_json::from_str::<HealthPayload>(
            r#"{"status":"UP","service":"x","timestamp":"t","details":[1,2]}"#
        )
        .is_err());
    }

    #[test]
    fn test_outcome_classification() {
        let up = HealthCheckOutcome::Reported(HealthPayload {
            status: ServiceStatus::Up,
            service: "a".into(),
            timestamp: "t".into(),
            details: None,
            error: None,
        });
        assert!(up.is_success());
        assert_eq!(up.failure_message(), None);

        let down = HealthCheckOutcome::Reported(HealthPayload {
            status: ServiceStatus::Down,
            error: Some("db unreachable".into()),
            ..up.payload().unwrap().clone()
        });
        assert!(!down.is_success());
        assert_eq!(down.label(), "down");
        assert_eq!(
            down.failure_message().unwrap(),
            "Service reported DOWN status: db unreachable"
        );

        let timeout = HealthCheckOutcome::Failed(ProbeError::Timeout {
            after_ms: Duration::from_secs(5).as_millis() as u64,
        });
        assert!(!timeout.is_success());
        assert!(timeout.payload().is_none());
        assert_eq!(timeout.label(), "timeout");
    }
}
