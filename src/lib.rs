//! Per-service circuit breakers and the health monitor that polls them.

pub mod admin;
pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::MonitorConfig;
pub use error::MonitorError;
pub use health::{HealthMonitor, HealthReport};
pub use lifecycle::Shutdown;
pub use resilience::{CircuitBreaker, CircuitState};
