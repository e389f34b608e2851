//! Health core error types

use std::time::Duration;
use thiserror::Error;
use vigil_store::StoreError;

/// Health core errors
#[derive(Debug, Error)]
pub enum HealthError {
    /// The shared store failed; a health check hitting this aborts the whole
    /// pass rather than reporting a partial snapshot.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The guard rejected the call before the logic ran. Terminal; callers
    /// retry per their own policy.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The guarded call was abandoned at its deadline.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The breaker short-circuited and no fallback was configured.
    #[error("circuit breaker open")]
    CircuitOpen,

    /// Handler input failed basic shape checks.
    #[error("invalid handler input: {0}")]
    InvalidInput(String),
}

/// Result type for health operations
pub type HealthResult<T> = std::result::Result<T, HealthError>;
