//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, periods > 0, ports valid)
//! - Detect duplicate service names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MonitorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{BreakerConfig, MonitorConfig, ServiceDescriptor};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: String,
        min: u64,
        value: u64,
    },

    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("duplicate service name '{0}'")]
    DuplicateService(String),

    #[error("service '{service}': {reason}")]
    InvalidService { service: String, reason: String },

    #[error("{field} is not a valid socket address: '{value}'")]
    InvalidAddress { field: String, value: String },

    #[error("admin.api_key must not be empty when the admin API is enabled")]
    MissingApiKey,
}

/// Validate a loaded configuration.
pub fn validate_config(config: &MonitorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_breaker(&config.breaker, &mut errors);

    let mut seen = HashSet::new();
    for service in &config.services {
        validate_service(service, &mut errors);
        if !service.name.is_empty() && !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address".into(),
            value: obs.metrics_address.clone(),
        });
    }

    let admin = &config.admin;
    if admin.enabled {
        if admin.api_key.is_empty() {
            errors.push(ValidationError::MissingApiKey);
        }
        if admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field: "admin.bind_address".into(),
                value: admin.bind_address.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_breaker(breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    min_check("breaker.failure_threshold", breaker.failure_threshold as u64, 1, errors);
    min_check("breaker.monitoring_period_ms", breaker.monitoring_period_ms, 1, errors);
    min_check("breaker.probe_timeout_ms", breaker.probe_timeout_ms, 1, errors);
}

fn validate_service(service: &ServiceDescriptor, errors: &mut Vec<ValidationError>) {
    if service.name.is_empty() {
        errors.push(ValidationError::EmptyServiceName);
        return;
    }

    let mut reasons = Vec::new();
    if service.host.is_empty() {
        reasons.push("host must not be empty");
    }
    if service.port == 0 {
        reasons.push("port must not be 0");
    }
    if !service.health_path.starts_with('/') {
        reasons.push("health_path must start with '/'");
    }
    if service.breaker.as_ref().and_then(|b| b.failure_threshold) == Some(0) {
        reasons.push("breaker.failure_threshold must be at least 1");
    }
    // Only meaningful once the individual parts are sane
    if reasons.is_empty() && service.health_url().is_err() {
        reasons.push("health endpoint does not form a valid URL");
    }

    errors.extend(reasons.into_iter().map(|reason| ValidationError::InvalidService {
        service: service.name.clone(),
        reason: reason.to_string(),
    }));
}

fn min_check(field: &str, value: u64, min: u64, errors: &mut Vec<ValidationError>) {
    if value < min {
        errors.push(ValidationError::TooSmall {
            field: field.to_string(),
            min,
            value,
        });
    }
}
