//! Circuit breaker + EMA bookkeeping shared by [`crate::local::LocalBackend`]
//! and [`crate::cloud::CloudBackend`] (spec.md §4.3 "Circuit breaker").

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::types::{BackendStats, CircuitState};

struct Inner {
    circuit: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<DateTime<Utc>>,
    ema_success_rate: f64,
    ema_latency_secs: f64,
    trials: u64,
    cumulative_reward: f64,
    success_count: u64,
    rate_limit_deadline: Option<DateTime<Utc>>,
    quota_exhausted: bool,
    backoff_secs: f64,
}

/// Mutable stats cell owned by a single backend instance. No cross-backend
/// or cross-task sharing; `parking_lot::Mutex` is cheap enough that we
/// don't bother with lock-free structures for single-writer state.
pub struct StatsCell {
    name: &'static str,
    failure_threshold: u32,
    recovery_secs: i64,
    ema_alpha: f64,
    backoff_base_secs: f64,
    backoff_cap_secs: f64,
    inner: Mutex<Inner>,
}

impl StatsCell {
    pub fn new(
        name: &'static str,
        failure_threshold: u32,
        recovery_secs: u64,
        ema_alpha: f64,
        backoff_base_secs: f64,
        backoff_cap_secs: f64,
    ) -> Self {
        Self {
            name,
            failure_threshold,
            recovery_secs: recovery_secs as i64,
            ema_alpha,
            backoff_base_secs,
            backoff_cap_secs,
            inner: Mutex::new(Inner {
                circuit: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                ema_success_rate: 1.0,
                ema_latency_secs: 0.0,
                trials: 0,
                cumulative_reward: 0.0,
                success_count: 0,
                rate_limit_deadline: None,
                quota_exhausted: false,
                backoff_secs: backoff_base_secs,
            }),
        }
    }

    pub fn trials(&self) -> u64 {
        self.inner.lock().trials
    }

    pub fn snapshot(&self) -> BackendStats {
        let g = self.inner.lock();
        BackendStats {
            name: self.name,
            circuit_state: g.circuit,
            consecutive_failures: g.consecutive_failures,
            last_failure: g.last_failure,
            ema_success_rate: g.ema_success_rate,
            ema_latency_secs: g.ema_latency_secs,
            trials: g.trials,
            cumulative_reward: g.cumulative_reward,
            success_count: g.success_count,
            rate_limit_deadline: g.rate_limit_deadline,
            quota_exhausted: g.quota_exhausted,
            backoff_secs: g.backoff_secs,
        }
    }

    /// Whether the backend may currently be invoked: circuit not open (or
    /// past its recovery window), no active rate-limit deadline, and no
    /// sticky quota-exhaustion flag.
    pub fn can_execute(&self) -> bool {
        let mut g = self.inner.lock();
        if g.quota_exhausted {
            return false;
        }
        if let Some(deadline) = g.rate_limit_deadline
            && Utc::now() < deadline
        {
            return false;
        }
        match g.circuit {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = g
                    .last_failure
                    .map(|t| (Utc::now() - t).num_seconds())
                    .unwrap_or(i64::MAX);
                if elapsed >= self.recovery_secs {
                    g.circuit = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self, latency_secs: f64, reward: f64) {
        let mut g = self.inner.lock();
        g.consecutive_failures = 0;
        if g.circuit == CircuitState::HalfOpen {
            g.circuit = CircuitState::Closed;
        }
        g.trials += 1;
        g.success_count += 1;
        g.cumulative_reward += reward;
        g.ema_success_rate = ema(g.ema_success_rate, 1.0, self.ema_alpha);
        g.ema_latency_secs = ema(g.ema_latency_secs, latency_secs, self.ema_alpha);
        g.backoff_secs = self.backoff_base_secs;
    }

    pub fn record_failure(&self, latency_secs: f64) {
        let mut g = self.inner.lock();
        g.trials += 1;
        g.consecutive_failures += 1;
        g.last_failure = Some(Utc::now());
        g.ema_success_rate = ema(g.ema_success_rate, 0.0, self.ema_alpha);
        g.ema_latency_secs = ema(g.ema_latency_secs, latency_secs, self.ema_alpha);

        if g.circuit == CircuitState::HalfOpen || g.consecutive_failures >= self.failure_threshold
        {
            g.circuit = CircuitState::Open;
        }

        g.backoff_secs = (g.backoff_secs * 2.0).min(self.backoff_cap_secs);
    }

    pub fn set_rate_limited(&self, retry_after_secs: Option<u64>) {
        let mut g = self.inner.lock();
        let secs = retry_after_secs.unwrap_or(g.backoff_secs.ceil() as u64);
        g.rate_limit_deadline = Some(Utc::now() + chrono::Duration::seconds(secs as i64));
    }

    pub fn set_quota_exhausted(&self) {
        self.inner.lock().quota_exhausted = true;
    }

    /// Cleared only by operator action (spec.md §7).
    pub fn clear_quota_exhausted(&self) {
        self.inner.lock().quota_exhausted = false;
    }
}

fn ema(prev: f64, sample: f64, alpha: f64) -> f64 {
    alpha * sample + (1.0 - alpha) * prev
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_failures() {
        let cell = StatsCell::new("test", 3, 30, 0.1, 1.0, 60.0);
        assert!(cell.can_execute());
        cell.record_failure(0.1);
        cell.record_failure(0.1);
        assert!(cell.can_execute());
        cell.record_failure(0.1);
        assert!(!cell.can_execute());
        assert_eq!(cell.snapshot().circuit_state, CircuitState::Open);
    }

    #[test]
    fn half_open_failure_reopens() {
        let cell = StatsCell::new("test", 1, 0, 0.1, 1.0, 60.0);
        cell.record_failure(0.1);
        assert!(cell.can_execute());
        assert_eq!(cell.snapshot().circuit_state, CircuitState::HalfOpen);
        cell.record_failure(0.1);
        assert_eq!(cell.snapshot().circuit_state, CircuitState::Open);
    }

    #[test]
    fn success_closes_half_open() {
        let cell = StatsCell::new("test", 1, 0, 0.1, 1.0, 60.0);
        cell.record_failure(0.1);
        assert!(cell.can_execute());
        cell.record_success(0.1, 0.5);
        assert_eq!(cell.snapshot().circuit_state, CircuitState::Closed);
    }

    #[test]
    fn quota_exhausted_blocks_regardless_of_circuit() {
        let cell = StatsCell::new("test", 5, 30, 0.1, 1.0, 60.0);
        cell.set_quota_exhausted();
        assert!(!cell.can_execute());
        cell.clear_quota_exhausted();
        assert!(cell.can_execute());
    }
}
