//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Health check for a service:
//!     → circuit_breaker.rs (fail fast while open, admit one trial when half-open)
//!     → timeouts.rs (enforce probe deadline)
//!     → circuit_breaker.rs (fold outcome into state)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every probe has a deadline
//! - Circuit breaker prevents cascading failures
//! - No retries: the next scheduled sweep is the retry

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{BreakerSnapshot, BreakerState, CircuitBreaker, CircuitState, HealthCheck};
