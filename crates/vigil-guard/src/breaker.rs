//! Circuit breaker state machine
//!
//! One breaker per protected operation type. Transitions:
//!
//! - `Closed → Open` when consecutive failures reach the threshold
//! - `Open → HalfOpen` once the open timeout has elapsed; the first call after
//!   that point becomes the single in-flight probe
//! - `HalfOpen → Closed` when the probe succeeds (failure counter resets)
//! - `HalfOpen → Open` when the probe fails (`opened_at` resets to now)
//!
//! While the probe is in flight, concurrent calls are rejected exactly like
//! calls against an open breaker. The probe slot is held by a [`ProbePermit`]
//! and released when the permit drops, so a probe call cancelled mid-flight
//! (its future dropped before an outcome was recorded) frees the slot for the
//! next caller instead of wedging the breaker open forever.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Calls pass through normally
    Closed,

    /// Calls are rejected immediately
    Open,

    /// One trial call is allowed through to probe recovery
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Exclusive hold on the half-open probe slot.
///
/// Dropping the permit releases the slot, whether or not an outcome was
/// recorded. Callers hold it for the duration of the probe call.
#[derive(Debug)]
pub struct ProbePermit {
    slot: Arc<AtomicBool>,
}

impl Drop for ProbePermit {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::SeqCst);
    }
}

/// Admission decision for one call.
#[derive(Debug)]
pub enum Admission {
    /// Breaker is closed; call proceeds normally
    Allowed,

    /// Breaker is half-open and this call is the recovery probe; the permit
    /// must be held until the call resolves
    Probe(ProbePermit),

    /// Breaker is open (or the probe slot is taken); short-circuit
    Rejected,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Circuit breaker for one protected operation type.
///
/// Monotonic time comes from `tokio::time::Instant` so paused-clock tests can
/// drive the open timeout deterministically.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    open_timeout: Duration,
    inner: Mutex<BreakerState>,
    probe_slot: Arc<AtomicBool>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, open_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            open_timeout,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            probe_slot: Arc::new(AtomicBool::new(false)),
        }
    }

    fn take_probe_slot(&self) -> Option<ProbePermit> {
        if self.probe_slot.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(ProbePermit {
                slot: self.probe_slot.clone(),
            })
        }
    }

    /// Decide whether one call may proceed.
    ///
    /// An open breaker whose timeout has elapsed flips to half-open here, and
    /// the deciding call takes the probe slot in the same critical section so
    /// racing callers cannot both become the probe.
    pub async fn try_acquire(&self) -> Admission {
        let mut s = self.inner.lock().await;
        match s.state {
            CircuitState::Closed => Admission::Allowed,

            CircuitState::Open => {
                let eligible = s
                    .opened_at
                    .map(|at| at.elapsed() >= self.open_timeout)
                    .unwrap_or(true);
                if !eligible {
                    return Admission::Rejected;
                }
                // A permit from the previous half-open round may still be
                // winding down; it keeps the slot until it drops.
                match self.take_probe_slot() {
                    Some(permit) => {
                        debug!("breaker entering half-open, admitting probe");
                        s.state = CircuitState::HalfOpen;
                        Admission::Probe(permit)
                    }
                    None => Admission::Rejected,
                }
            }

            CircuitState::HalfOpen => match self.take_probe_slot() {
                Some(permit) => Admission::Probe(permit),
                None => Admission::Rejected,
            },
        }
    }

    /// Record a successful call.
    pub async fn record_success(&self) {
        let mut s = self.inner.lock().await;
        match s.state {
            CircuitState::Closed => {
                s.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                debug!("probe succeeded, closing breaker");
                s.state = CircuitState::Closed;
                s.consecutive_failures = 0;
                s.opened_at = None;
            }
            // A success from work abandoned before the breaker opened; the
            // caller already saw a timeout, so it changes nothing here.
            CircuitState::Open => {}
        }
    }

    /// Record a failed call (an error or a timeout).
    pub async fn record_failure(&self) {
        let mut s = self.inner.lock().await;
        match s.state {
            CircuitState::Closed => {
                s.consecutive_failures += 1;
                if s.consecutive_failures >= self.failure_threshold {
                    debug!(
                        failures = s.consecutive_failures,
                        "failure threshold reached, opening breaker"
                    );
                    s.state = CircuitState::Open;
                    s.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                debug!("probe failed, reopening breaker");
                s.state = CircuitState::Open;
                s.opened_at = Some(Instant::now());
            }
            CircuitState::Open => {}
        }
    }

    /// Current state.
    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Consecutive failure count (resets on success).
    pub async fn consecutive_failures(&self) -> u32 {
        self.inner.lock().await.consecutive_failures
    }

    /// Force the breaker back to closed with counters cleared.
    ///
    /// An outstanding probe permit keeps its slot until it drops; closed
    /// state ignores the slot anyway.
    pub async fn reset(&self) {
        let mut s = self.inner.lock().await;
        s.state = CircuitState::Closed;
        s.consecutive_failures = 0;
        s.opened_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(3, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn opens_after_exactly_threshold_failures() {
        let b = breaker();

        b.record_failure().await;
        b.record_failure().await;
        assert_eq!(b.state().await, CircuitState::Closed);

        b.record_failure().await;
        assert_eq!(b.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn success_resets_the_failure_counter() {
        let b = breaker();

        b.record_failure().await;
        b.record_failure().await;
        b.record_success().await;
        assert_eq!(b.consecutive_failures().await, 0);

        b.record_failure().await;
        b.record_failure().await;
        assert_eq!(b.state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn open_rejects_until_timeout_then_admits_one_probe() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure().await;
        }

        assert!(matches!(b.try_acquire().await, Admission::Rejected));

        tokio::time::advance(Duration::from_millis(101)).await;
        let probe = b.try_acquire().await;
        assert!(matches!(probe, Admission::Probe(_)));
        // Probe slot is taken; concurrent calls are rejected like open.
        assert!(matches!(b.try_acquire().await, Admission::Rejected));
    }

    #[tokio::test(start_paused = true)]
    async fn successful_probe_closes_the_breaker() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure().await;
        }

        tokio::time::advance(Duration::from_millis(101)).await;
        let probe = b.try_acquire().await;
        assert!(matches!(probe, Admission::Probe(_)));

        b.record_success().await;
        drop(probe);
        assert_eq!(b.state().await, CircuitState::Closed);
        assert_eq!(b.consecutive_failures().await, 0);
        assert!(matches!(b.try_acquire().await, Admission::Allowed));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_reopens_with_a_fresh_timeout() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure().await;
        }

        tokio::time::advance(Duration::from_millis(101)).await;
        let probe = b.try_acquire().await;
        assert!(matches!(probe, Admission::Probe(_)));
        b.record_failure().await;
        drop(probe);
        assert_eq!(b.state().await, CircuitState::Open);

        // opened_at was reset: still rejected halfway into the new window.
        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(matches!(b.try_acquire().await, Admission::Rejected));

        tokio::time::advance(Duration::from_millis(51)).await;
        assert!(matches!(b.try_acquire().await, Admission::Probe(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_permit_releases_the_slot() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure().await;
        }

        tokio::time::advance(Duration::from_millis(101)).await;
        let probe = b.try_acquire().await;
        assert!(matches!(probe, Admission::Probe(_)));

        // Cancelled probe call: permit dropped with no outcome recorded.
        drop(probe);
        assert!(matches!(b.try_acquire().await, Admission::Probe(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn lingering_permit_blocks_a_new_probe_round() {
        let b = breaker();
        for _ in 0..3 {
            b.record_failure().await;
        }

        tokio::time::advance(Duration::from_millis(101)).await;
        let probe = b.try_acquire().await;
        assert!(matches!(probe, Admission::Probe(_)));
        b.record_failure().await;

        // Back in open with the old permit still alive: once the timeout
        // elapses, the slot is not handed out twice.
        tokio::time::advance(Duration::from_millis(101)).await;
        assert!(matches!(b.try_acquire().await, Admission::Rejected));

        drop(probe);
        assert!(matches!(b.try_acquire().await, Admission::Probe(_)));
    }
}
