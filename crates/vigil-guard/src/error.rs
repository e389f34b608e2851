//! Guard error types

use std::time::Duration;
use thiserror::Error;

/// Outcome of a guarded call that did not produce the real result.
///
/// `RateLimitExceeded` and `CircuitOpen` are terminal for the call: the
/// wrapped logic never ran and the breaker was not touched. `Timeout` and
/// `Inner` were recorded as breaker failures before being surfaced.
#[derive(Debug, Error)]
pub enum GuardError<E> {
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("circuit breaker open")]
    CircuitOpen,

    #[error("wrapped logic failed")]
    Inner(#[source] E),
}

impl<E> GuardError<E> {
    /// Whether the wrapped logic was ever invoked for this call.
    pub fn reached_logic(&self) -> bool {
        matches!(self, GuardError::Timeout(_) | GuardError::Inner(_))
    }
}
