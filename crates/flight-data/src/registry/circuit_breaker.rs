//! Per-provider circuit breaker for fault tolerance.
//!
//! Implements the circuit breaker pattern to keep failing providers out of
//! live searches. The circuit has three states:
//!
//! - **Closed**: Normal operation, calls are allowed through.
//! - **Open**: Provider is failing, calls are blocked until the cool-down ends.
//! - **HalfOpen**: Exactly one trial call decides whether to close or reopen.
//!
//! The cool-down grows exponentially each time the circuit trips and is
//! capped by [`CircuitBreakerConfig::max_cooldown`]. Every provider owns its
//! own breaker; nothing is shared across providers. State is in-memory and
//! resets on restart.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Default number of consecutive failures before opening the circuit.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default cool-down after the first trip.
const DEFAULT_BASE_COOLDOWN: Duration = Duration::from_secs(30);

/// Default growth factor applied per additional trip.
const DEFAULT_COOLDOWN_MULTIPLIER: u32 = 2;

/// Default upper bound on the cool-down.
const DEFAULT_MAX_COOLDOWN: Duration = Duration::from_secs(600);

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - calls are allowed.
    Closed,
    /// Provider is failing - calls are blocked.
    Open,
    /// Testing recovery - one trial call allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Cool-down after the first trip.
    pub base_cooldown: Duration,
    /// Factor applied to the cool-down for every further trip.
    pub cooldown_multiplier: u32,
    /// Upper bound on the cool-down.
    pub max_cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            base_cooldown: DEFAULT_BASE_COOLDOWN,
            cooldown_multiplier: DEFAULT_COOLDOWN_MULTIPLIER,
            max_cooldown: DEFAULT_MAX_COOLDOWN,
        }
    }
}

impl CircuitBreakerConfig {
    /// Cool-down applied when the circuit trips after `previous_trips` trips.
    ///
    /// `base * multiplier^previous_trips`, capped at `max_cooldown`.
    pub fn cooldown_for(&self, previous_trips: u32) -> Duration {
        self.cooldown_multiplier
            .checked_pow(previous_trips)
            .and_then(|factor| self.base_cooldown.checked_mul(factor))
            .map_or(self.max_cooldown, |cooldown| cooldown.min(self.max_cooldown))
    }
}

/// Input to the transition rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum CircuitEvent {
    /// Time passed; only cool-down expiry can change the state.
    Tick,
    Success,
    Failure,
}

/// Complete state of one circuit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Circuit {
    pub(crate) state: CircuitState,
    /// Consecutive failures while closed.
    pub(crate) failure_count: u32,
    /// Trips since the circuit was last closed by a successful trial.
    pub(crate) trips: u32,
    pub(crate) opened_at: Option<Instant>,
    pub(crate) cooldown: Duration,
    /// A half-open trial call has been admitted and not yet reported.
    pub(crate) trial_in_flight: bool,
}

impl Circuit {
    pub(crate) fn closed(config: &CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            trips: 0,
            opened_at: None,
            cooldown: config.base_cooldown,
            trial_in_flight: false,
        }
    }

    fn trip(self, config: &CircuitBreakerConfig, now: Instant) -> Self {
        Self {
            state: CircuitState::Open,
            opened_at: Some(now),
            cooldown: config.cooldown_for(self.trips),
            trips: self.trips.saturating_add(1),
            trial_in_flight: false,
            ..self
        }
    }
}

/// The transition rule: a pure function of the current circuit, the time
/// and the last event.
pub(crate) fn transition(
    circuit: Circuit,
    event: CircuitEvent,
    now: Instant,
    config: &CircuitBreakerConfig,
) -> Circuit {
    match (circuit.state, event) {
        (CircuitState::Open, CircuitEvent::Tick) => match circuit.opened_at {
            Some(opened_at) if now.saturating_duration_since(opened_at) >= circuit.cooldown => {
                Circuit {
                    state: CircuitState::HalfOpen,
                    trial_in_flight: false,
                    ..circuit
                }
            }
            _ => circuit,
        },
        (_, CircuitEvent::Tick) => circuit,

        (CircuitState::Closed, CircuitEvent::Success) => Circuit {
            failure_count: 0,
            ..circuit
        },
        (CircuitState::Closed, CircuitEvent::Failure) => {
            let failure_count = circuit.failure_count.saturating_add(1);
            let counted = Circuit {
                failure_count,
                ..circuit
            };
            if failure_count >= config.failure_threshold {
                counted.trip(config, now)
            } else {
                counted
            }
        }

        (CircuitState::HalfOpen, CircuitEvent::Success) => Circuit::closed(config),
        (CircuitState::HalfOpen, CircuitEvent::Failure) => circuit.trip(config, now),

        // Late outcome of a call dispatched before the circuit opened
        (CircuitState::Open, _) => circuit,
    }
}

/// Read-only view of one circuit.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub trip_count: u32,
    /// Cool-down of the current or most recent trip
    pub cooldown_ms: u64,
    /// Time left before a trial is allowed, zero unless OPEN
    pub retry_in_ms: u64,
}

/// Circuit breaker owned by a single provider.
///
/// Thread-safe; the state sits behind its own mutex, so two providers never
/// contend.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: String,
    circuit: Mutex<Circuit>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a breaker with default settings.
    pub fn new(provider: impl Into<String>) -> Self {
        Self::with_config(provider, CircuitBreakerConfig::default())
    }

    /// Create a breaker with custom configuration.
    pub fn with_config(provider: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            provider: provider.into(),
            circuit: Mutex::new(Circuit::closed(&config)),
            config,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Lock the circuit mutex, recovering from poison if necessary.
    ///
    /// The worst case after recovery is a slightly stale circuit state.
    fn lock_circuit(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(|poisoned| {
            warn!(
                "Circuit breaker mutex for '{}' was poisoned, recovering",
                self.provider
            );
            poisoned.into_inner()
        })
    }

    /// Apply an event and log state changes.
    fn apply(&self, circuit: &mut Circuit, event: CircuitEvent, now: Instant) {
        let before = *circuit;
        let after = transition(before, event, now, &self.config);

        if before.state != after.state {
            match after.state {
                CircuitState::Open => info!(
                    "Circuit breaker: opening circuit for '{}' for {:?} (trip {})",
                    self.provider, after.cooldown, after.trips
                ),
                CircuitState::HalfOpen => info!(
                    "Circuit breaker: transitioning '{}' from Open to HalfOpen",
                    self.provider
                ),
                CircuitState::Closed => info!(
                    "Circuit breaker: closing circuit for '{}' after successful trial",
                    self.provider
                ),
            }
        } else if event == CircuitEvent::Failure && after.state == CircuitState::Closed {
            debug!(
                "Circuit breaker: failure for '{}' ({}/{})",
                self.provider, after.failure_count, self.config.failure_threshold
            );
        }

        *circuit = after;
    }

    /// Whether the provider may be selected for a search.
    ///
    /// Evaluates cool-down expiry first, so an expired OPEN circuit reports
    /// as callable (HALF_OPEN). Does not claim the trial slot.
    pub fn is_callable(&self) -> bool {
        let mut circuit = self.lock_circuit();
        self.apply(&mut circuit, CircuitEvent::Tick, Instant::now());
        circuit.state != CircuitState::Open
    }

    /// Claim permission for one call as a [`CallPermit`].
    ///
    /// Always granted while CLOSED. While HALF_OPEN only the first caller
    /// gets the trial; everyone else is refused until it reports back.
    /// The permit reports the call's outcome. Dropping it unreported gives
    /// back a half-open trial, so a cancelled caller never strands the slot.
    pub fn acquire(self: &Arc<Self>) -> Option<CallPermit> {
        self.claim().map(|trial| CallPermit {
            breaker: Arc::clone(self),
            trial,
            settled: false,
        })
    }

    /// `Some(true)` when the claim is the half-open trial.
    fn claim(&self) -> Option<bool> {
        let mut circuit = self.lock_circuit();
        self.apply(&mut circuit, CircuitEvent::Tick, Instant::now());

        match circuit.state {
            CircuitState::Closed => Some(false),
            CircuitState::HalfOpen if !circuit.trial_in_flight => {
                circuit.trial_in_flight = true;
                debug!("Circuit breaker: admitting trial call for '{}'", self.provider);
                Some(true)
            }
            _ => None,
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut circuit = self.lock_circuit();
        self.apply(&mut circuit, CircuitEvent::Success, Instant::now());
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut circuit = self.lock_circuit();
        self.apply(&mut circuit, CircuitEvent::Failure, Instant::now());
    }

    /// Give back an admitted trial without recording an outcome.
    ///
    /// Used when a call ended in a way that says nothing about the vendor's
    /// health (missing configuration).
    pub fn release_trial(&self) {
        self.lock_circuit().trial_in_flight = false;
    }

    /// Current state after evaluating cool-down expiry.
    pub fn state(&self) -> CircuitState {
        let mut circuit = self.lock_circuit();
        self.apply(&mut circuit, CircuitEvent::Tick, Instant::now());
        circuit.state
    }

    /// Consecutive failures counted while closed.
    pub fn failure_count(&self) -> u32 {
        self.lock_circuit().failure_count
    }

    /// Force the circuit back to CLOSED and forget its trip history.
    pub fn reset(&self) {
        let mut circuit = self.lock_circuit();
        info!(
            "Circuit breaker: manually resetting circuit for '{}'",
            self.provider
        );
        *circuit = Circuit::closed(&self.config);
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let now = Instant::now();
        let mut circuit = self.lock_circuit();
        self.apply(&mut circuit, CircuitEvent::Tick, now);

        let retry_in = match (circuit.state, circuit.opened_at) {
            (CircuitState::Open, Some(opened_at)) => circuit
                .cooldown
                .saturating_sub(now.saturating_duration_since(opened_at)),
            _ => Duration::ZERO,
        };

        CircuitSnapshot {
            state: circuit.state,
            failure_count: circuit.failure_count,
            trip_count: circuit.trips,
            cooldown_ms: duration_ms(circuit.cooldown),
            retry_in_ms: duration_ms(retry_in),
        }
    }
}

/// Permission for one call, obtained from [`CircuitBreaker::acquire`].
#[must_use = "dropping a permit without reporting discards the call's outcome"]
#[derive(Debug)]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    trial: bool,
    settled: bool,
}

impl CallPermit {
    /// Whether this permit holds the half-open trial slot.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }

    /// End the call without an outcome, giving back the trial if held.
    pub fn release(mut self) {
        self.settled = true;
        if self.trial {
            self.breaker.release_trial();
        }
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            debug!(
                "Circuit breaker: trial for '{}' abandoned, releasing slot",
                self.breaker.provider
            );
            self.breaker.release_trial();
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: threshold,
            base_cooldown: Duration::from_secs(60),
            cooldown_multiplier: 2,
            max_cooldown: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_circuit_starts_closed() {
        let cb = Arc::new(CircuitBreaker::new("TEST_PROVIDER"));
        assert!(cb.is_callable());
        assert!(cb.acquire().is_some());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_circuit_opens_after_threshold() {
        let cb = Arc::new(CircuitBreaker::with_config("FAILING_PROVIDER", config(3)));

        // First two failures don't open circuit
        cb.record_failure();
        cb.record_failure();
        assert!(cb.is_callable());
        assert_eq!(cb.state(), CircuitState::Closed);

        // Third failure opens circuit
        cb.record_failure();
        assert!(!cb.is_callable());
        assert!(cb.acquire().is_none());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::with_config("INTERMITTENT_PROVIDER", config(3));

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.failure_count(), 2);

        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn test_transition_opens_then_half_opens_after_cooldown() {
        let cfg = config(2);
        let t0 = Instant::now();
        let mut circuit = Circuit::closed(&cfg);

        circuit = transition(circuit, CircuitEvent::Failure, t0, &cfg);
        circuit = transition(circuit, CircuitEvent::Failure, t0, &cfg);
        assert_eq!(circuit.state, CircuitState::Open);
        assert_eq!(circuit.cooldown, Duration::from_secs(60));

        let early = transition(circuit, CircuitEvent::Tick, t0 + Duration::from_secs(59), &cfg);
        assert_eq!(early.state, CircuitState::Open);

        let later = transition(circuit, CircuitEvent::Tick, t0 + Duration::from_secs(60), &cfg);
        assert_eq!(later.state, CircuitState::HalfOpen);
    }

    #[test]
    fn test_trial_success_closes_and_resets() {
        let cfg = config(1);
        let t0 = Instant::now();
        let mut circuit = transition(Circuit::closed(&cfg), CircuitEvent::Failure, t0, &cfg);
        circuit = transition(circuit, CircuitEvent::Tick, t0 + Duration::from_secs(61), &cfg);
        circuit = transition(circuit, CircuitEvent::Success, t0 + Duration::from_secs(62), &cfg);

        assert_eq!(circuit.state, CircuitState::Closed);
        assert_eq!(circuit.failure_count, 0);
        assert_eq!(circuit.trips, 0);
        assert_eq!(circuit.cooldown, cfg.base_cooldown);
    }

    #[test]
    fn test_trial_failure_reopens_with_longer_cooldown() {
        let cfg = config(1);
        let t0 = Instant::now();
        let mut circuit = transition(Circuit::closed(&cfg), CircuitEvent::Failure, t0, &cfg);
        let t1 = t0 + Duration::from_secs(60);
        circuit = transition(circuit, CircuitEvent::Tick, t1, &cfg);
        circuit = transition(circuit, CircuitEvent::Failure, t1, &cfg);

        assert_eq!(circuit.state, CircuitState::Open);
        assert_eq!(circuit.cooldown, Duration::from_secs(120));
        assert_eq!(circuit.opened_at, Some(t1));

        // Not yet half-open at the old cool-down
        let still_open = transition(circuit, CircuitEvent::Tick, t1 + Duration::from_secs(60), &cfg);
        assert_eq!(still_open.state, CircuitState::Open);
    }

    #[test]
    fn test_cooldown_is_capped() {
        let cfg = config(1);
        assert_eq!(cfg.cooldown_for(0), Duration::from_secs(60));
        assert_eq!(cfg.cooldown_for(1), Duration::from_secs(120));
        assert_eq!(cfg.cooldown_for(2), Duration::from_secs(240));
        assert_eq!(cfg.cooldown_for(3), Duration::from_secs(300));
        assert_eq!(cfg.cooldown_for(40), Duration::from_secs(300));
    }

    #[test]
    fn test_late_outcomes_ignored_while_open() {
        let cfg = config(1);
        let t0 = Instant::now();
        let open = transition(Circuit::closed(&cfg), CircuitEvent::Failure, t0, &cfg);
        assert_eq!(transition(open, CircuitEvent::Success, t0, &cfg), open);
        assert_eq!(transition(open, CircuitEvent::Failure, t0, &cfg), open);
    }

    #[test]
    fn test_single_trial_admitted_while_half_open() {
        let cb = Arc::new(CircuitBreaker::with_config(
            "FLAKY",
            CircuitBreakerConfig {
                failure_threshold: 1,
                base_cooldown: Duration::ZERO,
                cooldown_multiplier: 2,
                max_cooldown: Duration::ZERO,
            },
        ));
        cb.record_failure();

        // Zero cool-down: immediately half-open
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        let trial = cb.acquire().unwrap();
        assert!(cb.acquire().is_none());
        assert!(cb.is_callable());

        trial.success();
        assert_eq!(cb.state(), CircuitState::Closed);
        let first = cb.acquire().unwrap();
        let second = cb.acquire().unwrap();
        assert!(!first.is_trial() && !second.is_trial());
    }

    #[test]
    fn test_released_trial_can_be_claimed_again() {
        let cb = Arc::new(CircuitBreaker::with_config(
            "MISCONFIGURED",
            CircuitBreakerConfig {
                failure_threshold: 1,
                base_cooldown: Duration::ZERO,
                cooldown_multiplier: 2,
                max_cooldown: Duration::ZERO,
            },
        ));
        cb.record_failure();
        let trial = cb.acquire().unwrap();
        assert!(cb.acquire().is_none());

        trial.release();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.acquire().unwrap().is_trial());
    }

    #[test]
    fn test_dropped_trial_permit_frees_the_slot() {
        let cb = Arc::new(CircuitBreaker::with_config(
            "ABANDONED",
            CircuitBreakerConfig {
                failure_threshold: 1,
                base_cooldown: Duration::ZERO,
                cooldown_multiplier: 2,
                max_cooldown: Duration::ZERO,
            },
        ));
        cb.record_failure();

        let permit = cb.acquire().unwrap();
        assert!(permit.is_trial());
        assert!(cb.acquire().is_none());

        drop(permit);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        let permit = cb.acquire().unwrap();
        permit.success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_settled_permit_reports_once() {
        let cb = Arc::new(CircuitBreaker::with_config("SETTLED", config(2)));
        let permit = cb.acquire().unwrap();
        assert!(!permit.is_trial());
        permit.failure();
        assert_eq!(cb.failure_count(), 1);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_reset_closes_circuit() {
        let cb = CircuitBreaker::with_config("RESET_ME", config(1));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().trip_count, 0);
    }

    #[test]
    fn test_snapshot_reports_remaining_cooldown() {
        let cb = CircuitBreaker::with_config("SNAP", config(1));
        cb.record_failure();
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.cooldown_ms, 60_000);
        assert!(snapshot.retry_in_ms > 0 && snapshot.retry_in_ms <= 60_000);
    }
}
