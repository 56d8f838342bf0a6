//! Health monitor.
//!
//! # Responsibilities
//! - Own one circuit breaker per monitored service
//! - One-shot checks of a single service or of all services
//! - Periodically sweep all services and hand results to a sink
//!
//! # Design Decisions
//! - The breaker map is built once and never mutated, so lookups take no lock
//! - A sweep checks services concurrently; a slow service never delays another
//! - Sweeps run inline in the loop task, so two sweeps never overlap; ticks
//!   missed while a sweep is running collapse into a single pending one
//! - Shutdown cancels an in-flight sweep; abandoned probes never write state

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::{validate_config, BreakerConfig, ConfigError, MonitorConfig, ServiceDescriptor};
use crate::error::{MonitorError, MonitorResult};
use crate::health::probe::{HealthProbe, HttpProbe};
use crate::health::report::ReportSink;
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState, HealthCheck};

/// Result of checking one service through its breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedResult {
    #[serde(flatten)]
    pub check: HealthCheck,
    pub circuit_state: CircuitState,
    pub failure_count: u32,
}

impl AggregatedResult {
    fn new(check: HealthCheck, snapshot: BreakerSnapshot) -> Self {
        Self {
            check,
            circuit_state: snapshot.state,
            failure_count: snapshot.consecutive_failures,
        }
    }

    pub fn available(&self) -> bool {
        self.check.available
    }

    pub fn error(&self) -> Option<&str> {
        self.check.error.as_deref()
    }
}

/// Results of one sweep, keyed by service name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HealthReport {
    results: BTreeMap<String, AggregatedResult>,
}

impl HealthReport {
    pub fn get(&self, service: &str) -> Option<&AggregatedResult> {
        self.results.get(service)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AggregatedResult)> {
        self.results.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn unavailable_count(&self) -> usize {
        self.results.values().filter(|r| !r.available()).count()
    }

    pub fn all_available(&self) -> bool {
        self.unavailable_count() == 0
    }
}

impl FromIterator<(String, AggregatedResult)> for HealthReport {
    fn from_iter<I: IntoIterator<Item = (String, AggregatedResult)>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

/// Owns every breaker and drives checks across them.
#[derive(Debug)]
pub struct HealthMonitor {
    breakers: BTreeMap<String, CircuitBreaker>,
    period: Duration,
}

impl HealthMonitor {
    /// Build one breaker per service. Per-service overrides are merged over `config`.
    pub fn new(
        services: Vec<ServiceDescriptor>,
        config: &BreakerConfig,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        let mut breakers = BTreeMap::new();
        for service in services {
            let breaker_config = config.with_override(service.breaker.as_ref());
            let name = service.name.clone();
            let breaker = CircuitBreaker::new(service, breaker_config, probe.clone());
            if breakers.insert(name.clone(), breaker).is_some() {
                tracing::warn!(service = %name, "Duplicate service name, keeping the last definition");
            }
        }

        Self {
            breakers,
            period: config.monitoring_period(),
        }
    }

    /// Validate `config` and build a monitor probing over HTTP(S) with the
    /// configured timeout.
    pub fn from_config(config: &MonitorConfig) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;
        let probe = HttpProbe::new(config.breaker.probe_timeout())?;
        Ok(Self::new(
            config.services.clone(),
            &config.breaker,
            Arc::new(probe),
        ))
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.breakers.keys().map(String::as_str)
    }

    pub fn breaker(&self, name: &str) -> Option<&CircuitBreaker> {
        self.breakers.get(name)
    }

    /// Current state of every breaker, without probing.
    pub fn snapshot(&self) -> BTreeMap<String, BreakerSnapshot> {
        self.breakers
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.snapshot()))
            .collect()
    }

    /// Check one service through its breaker.
    pub async fn check_service(&self, name: &str) -> MonitorResult<AggregatedResult> {
        let breaker = self
            .breakers
            .get(name)
            .ok_or_else(|| MonitorError::ServiceNotFound(name.to_string()))?;

        let (check, snapshot) = breaker.check_with_snapshot().await;
        Ok(AggregatedResult::new(check, snapshot))
    }

    /// Check every registered service concurrently.
    pub async fn check_all_services(&self) -> HealthReport {
        let checks = self.breakers.iter().map(|(name, breaker)| async move {
            let (check, snapshot) = breaker.check_with_snapshot().await;
            (name.clone(), AggregatedResult::new(check, snapshot))
        });
        join_all(checks).await.into_iter().collect()
    }

    /// Spawn a task sweeping all services once per period until shutdown is
    /// signalled. The first sweep happens one full period after start.
    ///
    /// Fails with [`MonitorError::ZeroPeriod`] when the monitoring period is zero.
    pub fn start_monitoring<S: ReportSink>(
        self: &Arc<Self>,
        sink: S,
        shutdown: broadcast::Receiver<()>,
    ) -> MonitorResult<JoinHandle<()>> {
        if self.period.is_zero() {
            return Err(MonitorError::ZeroPeriod);
        }
        let monitor = Arc::clone(self);
        Ok(tokio::spawn(async move { monitor.run(sink, shutdown).await }))
    }

    async fn run<S: ReportSink>(&self, sink: S, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            services = ?self.service_names().collect::<Vec<_>>(),
            period_ms = self.period.as_millis() as u64,
            "Health monitor starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }

            let report = tokio::select! {
                report = self.check_all_services() => report,
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor shut down mid-sweep, abandoning in-flight probes");
                    break;
                }
            };

            sink.report(&report);
        }
    }
}
