//! Caller-facing errors.
//!
//! Downstream outages are never errors here; they are unavailable results.
//! These variants describe a misconfigured caller.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("Service {0} not found")]
    ServiceNotFound(String),

    #[error("Monitoring period must be greater than zero")]
    ZeroPeriod,
}

pub type MonitorResult<T> = Result<T, MonitorError>;
