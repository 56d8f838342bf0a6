//! Circuit breaker for monitored services.
//!
//! # States
//! - Closed: normal operation, probes pass through
//! - Open: service assumed down, checks fail fast without a network call
//! - Half-Open: exactly one trial probe decides the next state
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: now >= next_attempt (reset timeout elapsed)
//! Half-Open → Closed: trial probe succeeds
//! Half-Open → Open: trial probe fails, next_attempt = failure time + reset timeout
//! ```
//!
//! # Design Decisions
//! - Transition logic lives in [`BreakerState`], a plain value with no I/O
//! - One breaker per service (not global)
//! - Checks on one breaker are serialized by an async gate held across the
//!   probe, so a second caller never mistakes itself for the trial probe
//! - State is only written after the probe resolves; a cancelled check leaves
//!   no trace beyond the Open → Half-Open move that admitted it

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::{BreakerConfig, ServiceDescriptor};
use crate::health::payload::{HealthCheckOutcome, HealthPayload};
use crate::health::probe::HealthProbe;
use crate::observability::metrics;

/// Breaker state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("CLOSED"),
            CircuitState::Open => f.write_str("OPEN"),
            CircuitState::HalfOpen => f.write_str("HALF_OPEN"),
        }
    }
}

/// Whether a probe may be sent right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Probe,
    Rejected { retry_in: Duration },
}

/// A state change produced by [`BreakerState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Mutable runtime state of one breaker.
#[derive(Debug, Clone)]
pub struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    next_attempt: Option<Instant>,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakerState {
    pub fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            next_attempt: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    pub fn next_attempt(&self) -> Option<Instant> {
        self.next_attempt
    }

    /// Time left before an open circuit admits a trial probe.
    pub fn retry_in(&self, now: Instant) -> Option<Duration> {
        match (self.state, self.next_attempt) {
            (CircuitState::Open, Some(next)) if now < next => Some(next - now),
            _ => None,
        }
    }

    /// Decide whether a probe may go out at `now`.
    ///
    /// An open circuit whose reset timeout has elapsed moves to Half-Open and
    /// admits the probe.
    pub fn admit(&mut self, now: Instant) -> (Admission, Option<Transition>) {
        if self.state != CircuitState::Open {
            return (Admission::Probe, None);
        }
        if let Some(retry_in) = self.retry_in(now) {
            return (Admission::Rejected { retry_in }, None);
        }
        (Admission::Probe, self.move_to(CircuitState::HalfOpen))
    }

    pub fn record_success(&mut self) -> Option<Transition> {
        self.consecutive_failures = 0;
        self.next_attempt = None;
        self.move_to(CircuitState::Closed)
    }

    pub fn record_failure(&mut self, now: Instant, config: &BreakerConfig) -> Option<Transition> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(now);

        let trips = match self.state {
            CircuitState::Closed => self.consecutive_failures >= config.failure_threshold,
            CircuitState::HalfOpen | CircuitState::Open => true,
        };
        if !trips {
            return None;
        }
        self.next_attempt = Some(now + config.reset_timeout());
        self.move_to(CircuitState::Open)
    }

    fn move_to(&mut self, to: CircuitState) -> Option<Transition> {
        let from = self.state;
        self.state = to;
        (from != to).then_some(Transition { from, to })
    }
}

/// Result of [`CircuitBreaker::check_health`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheck {
    pub available: bool,
    /// `None` when the open circuit skipped the probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<HealthCheckOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Remaining wait when the check was short-circuited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_ms: Option<u64>,
}

impl HealthCheck {
    pub fn response(&self) -> Option<&HealthPayload> {
        self.outcome.as_ref().and_then(HealthCheckOutcome::payload)
    }

    /// Whether a probe was actually sent.
    pub fn probed(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Read-only view of a breaker, consistent at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_ms: Option<u64>,
}

/// Circuit breaker bound to one monitored service.
pub struct CircuitBreaker {
    service: ServiceDescriptor,
    config: BreakerConfig,
    probe: Arc<dyn HealthProbe>,
    state: Mutex<BreakerState>,
    gate: tokio::sync::Mutex<()>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("service", &self.service.name)
            .field("config", &self.config)
            .field("state", &*self.lock())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(service: ServiceDescriptor, config: BreakerConfig, probe: Arc<dyn HealthProbe>) -> Self {
        Self {
            service,
            config,
            probe,
            state: Mutex::new(BreakerState::new()),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state()
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().consecutive_failures()
    }

    /// When the last failure was recorded. Diagnostic only.
    pub fn last_failure(&self) -> Option<Instant> {
        self.lock().last_failure()
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        Self::snapshot_of(&self.lock(), Instant::now())
    }

    /// Probe the service if the circuit allows it and fold the outcome into state.
    ///
    /// Never fails: transport, protocol and reported-down failures all come
    /// back as an unavailable [`HealthCheck`].
    pub async fn check_health(&self) -> HealthCheck {
        self.check_with_snapshot().await.0
    }

    /// Like [`check_health`](Self::check_health), also returning the breaker
    /// state as it stood right after this check.
    pub async fn check_with_snapshot(&self) -> (HealthCheck, BreakerSnapshot) {
        // Fail fast without queueing behind an in-flight probe
        {
            let state = self.lock();
            let now = Instant::now();
            if let Some(retry_in) = state.retry_in(now) {
                return (self.rejected(retry_in), Self::snapshot_of(&state, now));
            }
        }

        let _permit = self.gate.lock().await;

        {
            let mut state = self.lock();
            let now = Instant::now();
            let (admission, transition) = state.admit(now);
            self.on_transition(transition, &state);
            if let Admission::Rejected { retry_in } = admission {
                return (self.rejected(retry_in), Self::snapshot_of(&state, now));
            }
        }

        let started = Instant::now();
        let outcome = self.probe.probe(&self.service).await;
        metrics::record_probe(&self.service.name, outcome.label(), started.elapsed());

        let mut state = self.lock();
        let now = Instant::now();
        let transition = if outcome.is_success() {
            state.record_success()
        } else {
            state.record_failure(now, &self.config)
        };
        self.on_transition(transition, &state);

        let error = outcome.failure_message();
        if let Some(error) = &error {
            tracing::debug!(
                service = %self.service.name,
                result = outcome.label(),
                failures = state.consecutive_failures(),
                error = %error,
                "Health probe failed"
            );
        }

        let check = HealthCheck {
            available: error.is_none(),
            outcome: Some(outcome),
            error,
            retry_in_ms: None,
        };
        (check, Self::snapshot_of(&state, now))
    }

    fn rejected(&self, retry_in: Duration) -> HealthCheck {
        tracing::debug!(
            service = %self.service.name,
            retry_in_ms = retry_in.as_millis() as u64,
            "Circuit open, skipping probe"
        );
        metrics::record_short_circuit(&self.service.name);
        HealthCheck {
            available: false,
            outcome: None,
            error: Some(format!(
                "Circuit breaker OPEN for {}. Next attempt in {}s",
                self.service.name,
                retry_in.as_millis().div_ceil(1000)
            )),
            retry_in_ms: Some(retry_in.as_millis() as u64),
        }
    }

    fn on_transition(&self, transition: Option<Transition>, state: &BreakerState) {
        let Some(Transition { from, to }) = transition else {
            return;
        };
        let failures = state.consecutive_failures();
        match to {
            CircuitState::Open => tracing::warn!(
                service = %self.service.name,
                %from,
                failures,
                reset_timeout_ms = self.config.reset_timeout_ms,
                "Circuit breaker moved to OPEN state"
            ),
            _ => tracing::info!(
                service = %self.service.name,
                %from,
                "Circuit breaker moved to {} state",
                to
            ),
        }
        metrics::record_breaker_state(&self.service.name, to, failures);
    }

    fn snapshot_of(state: &BreakerState, now: Instant) -> BreakerSnapshot {
        BreakerSnapshot {
            state: state.state(),
            consecutive_failures: state.consecutive_failures(),
            retry_in_ms: state.retry_in(now).map(|d| d.as_millis() as u64),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // State is always left consistent between statements; poisoning is harmless
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::probe::testing::{down, refused, up, ScriptedProbe};

    fn config(threshold: u32, reset_ms: u64) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: threshold,
            reset_timeout_ms: reset_ms,
            ..BreakerConfig::default()
        }
    }

    fn breaker(probe: &Arc<ScriptedProbe>, config: BreakerConfig) -> CircuitBreaker {
        CircuitBreaker::new(
            ServiceDescriptor::http("image-server", "localhost", 8081),
            config,
            probe.clone(),
        )
    }

    // --- BreakerState ---

    #[test]
    fn test_state_opens_only_at_threshold() {
        let cfg = config(3, 1000);
        let now = Instant::now();
        let mut st = BreakerState::new();

        assert_eq!(st.record_failure(now, &cfg), None);
        assert_eq!(st.record_failure(now, &cfg), None);
        assert_eq!(st.state(), CircuitState::Closed);
        let t = st.record_failure(now, &cfg);
        assert_eq!(
            t,
            Some(Transition {
                from: CircuitState::Closed,
                to: CircuitState::Open
            })
        );
        assert_eq!(st.consecutive_failures(), 3);
        assert_eq!(st.next_attempt(), Some(now + Duration::from_secs(1)));
        assert_eq!(st.last_failure(), Some(now));
    }

    #[test]
    fn test_success_resets_count_while_closed() {
        let cfg = config(2, 1000);
        let now = Instant::now();
        let mut st = BreakerState::new();
        st.record_failure(now, &cfg);
        assert_eq!(st.record_success(), None);
        assert_eq!(st.consecutive_failures(), 0);
        st.record_failure(now, &cfg);
        assert_eq!(st.state(), CircuitState::Closed);
    }

    #[test]
    fn test_admit_respects_next_attempt() {
        let cfg = config(1, 30_000);
        let t0 = Instant::now();
        let mut st = BreakerState::new();
        st.record_failure(t0, &cfg);

        let (admission, transition) = st.admit(t0 + Duration::from_secs(10));
        assert_eq!(
            admission,
            Admission::Rejected {
                retry_in: Duration::from_secs(20)
            }
        );
        assert_eq!(transition, None);

        let (admission, transition) = st.admit(t0 + Duration::from_secs(30));
        assert_eq!(admission, Admission::Probe);
        assert_eq!(transition.map(|t| t.to), Some(CircuitState::HalfOpen));
    }

    #[test]
    fn test_half_open_failure_reopens_from_failure_time() {
        let cfg = config(3, 30_000);
        let t0 = Instant::now();
        let mut st = BreakerState::new();
        for _ in 0..3 {
            st.record_failure(t0, &cfg);
        }
        let trial_start = t0 + Duration::from_secs(31);
        st.admit(trial_start);
        assert_eq!(st.state(), CircuitState::HalfOpen);

        let failed_at = trial_start + Duration::from_secs(4);
        st.record_failure(failed_at, &cfg);
        assert_eq!(st.state(), CircuitState::Open);
        assert_eq!(st.consecutive_failures(), 4);
        assert_eq!(st.next_attempt(), Some(failed_at + Duration::from_secs(30)));
    }

    #[test]
    fn test_half_open_success_closes_and_resets() {
        let cfg = config(3, 0);
        let t0 = Instant::now();
        let mut st = BreakerState::new();
        for _ in 0..7 {
            st.record_failure(t0, &cfg);
        }
        st.admit(t0);
        assert_eq!(st.state(), CircuitState::HalfOpen);
        assert_eq!(st.record_success().map(|t| t.to), Some(CircuitState::Closed));
        assert_eq!(st.consecutive_failures(), 0);
        assert_eq!(st.next_attempt(), None);
    }

    // --- CircuitBreaker ---

    #[tokio::test(start_paused = true)]
    async fn test_reference_scenario() {
        let probe = Arc::new(ScriptedProbe::new(vec![refused(), refused(), refused()], up("image-server")));
        let cb = breaker(&probe, config(3, 30_000));

        for _ in 0..3 {
            let check = cb.check_health().await;
            assert!(!check.available);
            assert!(check.probed());
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.failure_count(), 3);
        assert_eq!(probe.calls(), 3);

        // Fourth call before the reset timeout: no network call
        let check = cb.check_health().await;
        assert!(!check.available);
        assert!(!check.probed());
        assert_eq!(
            check.error.as_deref(),
            Some("Circuit breaker OPEN for image-server. Next attempt in 30s")
        );
        assert_eq!(check.retry_in_ms, Some(30_000));
        assert_eq!(probe.calls(), 3);

        tokio::time::advance(Duration::from_secs(30)).await;

        let check = cb.check_health().await;
        assert!(check.available);
        assert_eq!(check.response().map(|p| p.service.as_str()), Some("image-server"));
        assert_eq!(probe.calls(), 4);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_wait_rounds_up() {
        let probe = Arc::new(ScriptedProbe::always(refused()));
        let cb = breaker(&probe, config(1, 30_000));
        cb.check_health().await;

        tokio::time::advance(Duration::from_millis(29_500)).await;
        let check = cb.check_health().await;
        assert_eq!(check.retry_in_ms, Some(500));
        assert!(check.error.unwrap().ends_with("Next attempt in 1s"));
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reported_down_counts_as_failure_and_keeps_payload() {
        let probe = Arc::new(ScriptedProbe::always(down("image-server")));
        let cb = breaker(&probe, config(2, 1_000));

        let check = cb.check_health().await;
        assert!(!check.available);
        assert_eq!(check.error.as_deref(), Some("Service reported DOWN status"));
        assert!(check.response().is_some());
        assert_eq!(cb.failure_count(), 1);

        cb.check_health().await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_extends_from_failure_moment() {
        let probe = Arc::new(
            ScriptedProbe::new(vec![refused()], refused()).with_delay(Duration::from_secs(2)),
        );
        let cb = breaker(&probe, config(1, 30_000));

        cb.check_health().await;
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(30)).await;
        // Trial probe takes 2s and fails
        let check = cb.check_health().await;
        assert!(check.probed());
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.failure_count(), 2);
        assert_eq!(cb.last_failure(), Some(Instant::now()));
        assert_eq!(cb.snapshot().retry_in_ms, Some(30_000));

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!cb.check_health().await.probed());
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_checks_share_one_trial_probe() {
        let probe = Arc::new(
            ScriptedProbe::new(vec![refused()], down("image-server"))
                .with_delay(Duration::from_secs(1)),
        );
        let cb = breaker(&probe, config(1, 10_000));
        cb.check_health().await;
        tokio::time::advance(Duration::from_secs(10)).await;

        let (a, b) = tokio::join!(cb.check_health(), cb.check_health());

        // Exactly one of the two carried the trial probe
        assert_eq!(probe.calls(), 2);
        assert!(a.probed() ^ b.probed());
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.failure_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_reset_timeout_probes_immediately() {
        let probe = Arc::new(ScriptedProbe::new(vec![refused()], up("image-server")));
        let cb = breaker(&probe, config(1, 0));

        cb.check_health().await;
        assert_eq!(cb.state(), CircuitState::Open);

        let check = cb.check_health().await;
        assert!(check.available);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_check_does_not_write_state() {
        let probe = Arc::new(ScriptedProbe::always(refused()).with_delay(Duration::from_secs(5)));
        let cb = breaker(&probe, config(1, 1_000));

        let res = tokio::time::timeout(Duration::from_secs(1), cb.check_health()).await;
        assert!(res.is_err());
        assert_eq!(probe.calls(), 1);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }
}
