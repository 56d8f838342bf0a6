//! Reporting sinks for sweep results.
//!
//! The monitor hands every completed sweep to a [`ReportSink`]. Sinks must be
//! cheap; they run on the monitor task between sweeps.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::health::monitor::HealthReport;
use crate::observability::metrics;

/// Receives the results of each scheduled sweep.
pub trait ReportSink: Send + Sync + 'static {
    fn report(&self, report: &HealthReport);
}

impl<S: ReportSink + ?Sized> ReportSink for Arc<S> {
    fn report(&self, report: &HealthReport) {
        (**self).report(report)
    }
}

impl<A: ReportSink, B: ReportSink> ReportSink for (A, B) {
    fn report(&self, report: &HealthReport) {
        self.0.report(report);
        self.1.report(report);
    }
}

/// Sink backed by a closure. Built with [`report_fn`].
#[derive(Clone, Copy)]
pub struct ReportFn<F> {
    f: F,
}

impl<F> std::fmt::Debug for ReportFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportFn").finish_non_exhaustive()
    }
}

impl<F> ReportSink for ReportFn<F>
where
    F: Fn(&HealthReport) + Send + Sync + 'static,
{
    fn report(&self, report: &HealthReport) {
        (self.f)(report)
    }
}

/// Wrap a closure as a [`ReportSink`].
///
/// A blanket `Fn` impl would overlap the `Arc` and tuple impls.
pub fn report_fn<F>(f: F) -> ReportFn<F>
where
    F: Fn(&HealthReport) + Send + Sync + 'static,
{
    ReportFn { f }
}

/// Prints a human readable block per sweep to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Render a report the way it is printed.
    pub fn render(report: &HealthReport) -> String {
        let mut out = String::from("\n=== Health Check Results ===\n");
        for (name, result) in report.iter() {
            let status = if result.available() { "✅ UP" } else { "❌ DOWN" };
            let _ = writeln!(out, "{}: {} [Circuit: {}]", name, status, result.circuit_state);
            if let (false, Some(error)) = (result.available(), result.error()) {
                let _ = writeln!(out, "  Error: {}", error);
            }
        }
        out
    }
}

impl ReportSink for ConsoleReporter {
    fn report(&self, report: &HealthReport) {
        print!("{}", Self::render(report));
    }
}

/// Emits one structured tracing event per service.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ReportSink for LogReporter {
    fn report(&self, report: &HealthReport) {
        for (name, result) in report.iter() {
            if result.available() {
                tracing::info!(
                    service = %name,
                    circuit = %result.circuit_state,
                    "Service available"
                );
            } else {
                tracing::warn!(
                    service = %name,
                    circuit = %result.circuit_state,
                    failures = result.failure_count,
                    error = result.error().unwrap_or_default(),
                    "Service unavailable"
                );
            }
        }
    }
}

/// Records per-sweep gauges through the metrics facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsReporter;

impl ReportSink for MetricsReporter {
    fn report(&self, report: &HealthReport) {
        metrics::record_sweep(report.unavailable_count());
    }
}

/// Keeps the most recent sweep for the admin API.
#[derive(Debug, Default)]
pub struct LatestReport {
    latest: RwLock<Option<HealthReport>>,
    sweeps: AtomicU64,
}

impl LatestReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<HealthReport> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of sweeps recorded so far.
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }
}

impl ReportSink for LatestReport {
    fn report(&self, report: &HealthReport) {
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }
}
