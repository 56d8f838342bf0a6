//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the monitor.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the health monitor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Breaker tunables shared by every monitored service.
    pub breaker: BreakerConfig,

    /// Services to monitor, one circuit breaker each.
    pub services: Vec<ServiceDescriptor>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin dashboard settings.
    pub admin: AdminConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            breaker: BreakerConfig::default(),
            services: vec![
                ServiceDescriptor::http("image-server", "localhost", 8081),
                ServiceDescriptor::http("file-system-server", "localhost", 4040),
                ServiceDescriptor::http("broker-gateway", "localhost", 8080),
            ],
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Circuit breaker tunables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures required to open the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before a trial probe, in milliseconds.
    pub reset_timeout_ms: u64,

    /// Interval between scheduled sweeps, in milliseconds.
    pub monitoring_period_ms: u64,

    /// Hard deadline for a single health probe, in milliseconds.
    pub probe_timeout_ms: u64,
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn monitoring_period(&self) -> Duration {
        Duration::from_millis(self.monitoring_period_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Merge a per-service override on top of this config.
    pub fn with_override(&self, over: Option<&BreakerOverride>) -> BreakerConfig {
        let mut merged = self.clone();
        if let Some(over) = over {
            if let Some(threshold) = over.failure_threshold {
                merged.failure_threshold = threshold;
            }
            if let Some(reset) = over.reset_timeout_ms {
                merged.reset_timeout_ms = reset;
            }
        }
        merged
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_ms: 30_000,
            monitoring_period_ms: 10_000,
            probe_timeout_ms: 5_000,
        }
    }
}

/// Per-service breaker settings that win over the shared [`BreakerConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BreakerOverride {
    pub failure_threshold: Option<u32>,
    pub reset_timeout_ms: Option<u64>,
}

/// Transport scheme used to reach a service's health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => f.write_str("http"),
            Scheme::Https => f.write_str("https"),
        }
    }
}

/// Static description of one monitored service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceDescriptor {
    /// Unique service name, used as the monitor key.
    pub name: String,

    /// Host name or IP address.
    #[serde(default = "default_host")]
    pub host: String,

    pub port: u16,

    #[serde(default)]
    pub scheme: Scheme,

    /// Path of the health endpoint (e.g., "/health").
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Optional breaker override for this service only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaker: Option<BreakerOverride>,
}

impl ServiceDescriptor {
    /// Plain-HTTP service probed at `/health`.
    pub fn http(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            scheme: Scheme::Http,
            health_path: default_health_path(),
            breaker: None,
        }
    }

    /// Full URL of the health endpoint.
    pub fn health_url(&self) -> Result<url::Url, url::ParseError> {
        url::Url::parse(&format!(
            "{}://{}:{}{}",
            self.scheme, self.host, self.port, self.health_path
        ))
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin dashboard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin dashboard.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin dashboard bind address.
    pub bind_address: String,

    /// Request timeout for admin handlers in seconds. Covers on-demand sweeps.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8090".to_string(),
            request_timeout_secs: 30,
        }
    }
}
