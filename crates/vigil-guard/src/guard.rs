//! The resilience guard: rate limiting, timeout, circuit breaker, fallback
//!
//! [`OperationGuard`] wraps a single invocation of business logic. The
//! mechanisms compose in a fixed order: the rate limiter runs first (a
//! rejection never reaches the breaker), then the breaker decides admission,
//! then the wrapped future is raced against the call timeout. Timeouts are
//! cooperative: the wrapped future is dropped at the deadline and its eventual
//! result, if any, is discarded - callers must keep wrapped logic idempotent
//! or side-effect-safe under abandonment.
//!
//! [`GuardRegistry`] owns one guard per operation identity. Guard state is
//! process-scoped; it protects the process that holds it.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};
use vigil_types::OperationId;

use crate::breaker::{Admission, CircuitBreaker, CircuitState};
use crate::config::GuardConfig;
use crate::error::GuardError;
use crate::rate_limit::FixedWindowLimiter;

/// Resilience wrapper for one protected operation type.
pub struct OperationGuard {
    operation: OperationId,
    config: GuardConfig,
    limiter: FixedWindowLimiter,
    breaker: CircuitBreaker,
}

impl OperationGuard {
    pub fn new(operation: OperationId, config: GuardConfig) -> Self {
        let limiter = FixedWindowLimiter::new(config.rate_limit, config.rate_window);
        let breaker = CircuitBreaker::new(config.failure_threshold, config.open_timeout);
        Self {
            operation,
            config,
            limiter,
            breaker,
        }
    }

    /// The operation this guard protects.
    pub fn operation(&self) -> &OperationId {
        &self.operation
    }

    /// Current breaker state, for observability surfaces.
    pub async fn breaker_state(&self) -> CircuitState {
        self.breaker.state().await
    }

    /// Run one invocation through the guard.
    ///
    /// Returns the real result, the `fallback` (when the breaker
    /// short-circuits and one is configured), or a typed failure - never a
    /// silent hang past the configured timeout. A short-circuited call does
    /// not run the wrapped logic and does not spend its timeout budget.
    pub async fn execute<T, E, F>(
        &self,
        fut: F,
        fallback: Option<T>,
    ) -> Result<T, GuardError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        if !self.limiter.try_acquire().await {
            debug!(operation = %self.operation, "rate limit exceeded");
            return Err(GuardError::RateLimitExceeded);
        }

        // Held for the rest of the call: if this invocation is the half-open
        // probe and its future is dropped before an outcome lands, the permit
        // releases the slot so the breaker is not wedged.
        let _probe = match self.breaker.try_acquire().await {
            Admission::Rejected => {
                debug!(operation = %self.operation, "circuit open, short-circuiting");
                return match fallback {
                    Some(value) => Ok(value),
                    None => Err(GuardError::CircuitOpen),
                };
            }
            Admission::Allowed => None,
            Admission::Probe(permit) => Some(permit),
        };

        match tokio::time::timeout(self.config.call_timeout, fut).await {
            Ok(Ok(value)) => {
                self.breaker.record_success().await;
                Ok(value)
            }
            Ok(Err(e)) => {
                self.breaker.record_failure().await;
                Err(GuardError::Inner(e))
            }
            Err(_) => {
                // The future was dropped at the deadline; whatever it would
                // have produced is discarded, never applied.
                warn!(
                    operation = %self.operation,
                    timeout_ms = self.config.call_timeout.as_millis() as u64,
                    "call abandoned at deadline"
                );
                self.breaker.record_failure().await;
                Err(GuardError::Timeout(self.config.call_timeout))
            }
        }
    }
}

/// Registry of guards keyed by operation identity.
///
/// Guards are created lazily with the registry's default configuration;
/// operations with special needs register an explicit config up front.
pub struct GuardRegistry {
    default_config: GuardConfig,
    guards: DashMap<OperationId, Arc<OperationGuard>>,
}

impl GuardRegistry {
    pub fn new(default_config: GuardConfig) -> Self {
        Self {
            default_config,
            guards: DashMap::new(),
        }
    }

    /// Get or create the guard for an operation.
    pub fn guard(&self, operation: &OperationId) -> Arc<OperationGuard> {
        self.guards
            .entry(operation.clone())
            .or_insert_with(|| {
                Arc::new(OperationGuard::new(
                    operation.clone(),
                    self.default_config.clone(),
                ))
            })
            .clone()
    }

    /// Register an operation with its own configuration, replacing any
    /// previously created guard (and its accumulated state).
    pub fn register(&self, operation: OperationId, config: GuardConfig) -> Arc<OperationGuard> {
        let guard = Arc::new(OperationGuard::new(operation.clone(), config));
        self.guards.insert(operation, guard.clone());
        guard
    }

    /// Breaker state per known operation, for observability surfaces.
    pub async fn states(&self) -> Vec<(OperationId, CircuitState)> {
        let guards: Vec<Arc<OperationGuard>> =
            self.guards.iter().map(|g| g.value().clone()).collect();

        let mut states = Vec::with_capacity(guards.len());
        for guard in guards {
            states.push((guard.operation().clone(), guard.breaker_state().await));
        }
        states
    }
}

impl Default for GuardRegistry {
    fn default() -> Self {
        Self::new(GuardConfig::default())
    }
}
