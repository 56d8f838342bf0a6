//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! One-shot or periodic (monitor.rs):
//!     HealthMonitor::check_all_services
//!     → CircuitBreaker::check_health per service (resilience)
//!     → probe.rs issues GET <health_path> unless the circuit is open
//!     → payload.rs parses the body into a HealthCheckOutcome
//!     → merged into a HealthReport keyed by service name
//!     → report.rs sinks (console, logs, metrics, admin API)
//! ```
//!
//! # Design Decisions
//! - Transport, protocol and reported-DOWN failures feed the same counter
//! - Outages are values, never errors; only an unknown service name is an error
//! - Health state is per-service

pub mod monitor;
pub mod payload;
pub mod probe;
pub mod report;

pub use monitor::{AggregatedResult, HealthMonitor, HealthReport};
pub use payload::{HealthCheckOutcome, HealthPayload, ServiceStatus};
pub use probe::{HealthProbe, HttpProbe, ProbeError};
pub use report::{
    report_fn, ConsoleReporter, LatestReport, LogReporter, MetricsReporter, ReportFn, ReportSink,
};
