//! Guard configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one protected operation type.
///
/// Every field has a conservative default; services typically override
/// `failure_threshold` and `call_timeout` per operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Maximum calls admitted per rate window
    pub rate_limit: u32,

    /// Length of the fixed rate window
    pub rate_window: Duration,

    /// Deadline for the wrapped logic; expiry counts as a breaker failure
    pub call_timeout: Duration,

    /// Consecutive failures that trip the breaker open
    pub failure_threshold: u32,

    /// How long the breaker stays open before admitting a probe
    pub open_timeout: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            rate_limit: 100,
            rate_window: Duration::from_secs(60),
            call_timeout: Duration::from_secs(5),
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

impl GuardConfig {
    /// Relaxed settings for tests: tiny windows, short timeouts.
    pub fn for_testing() -> Self {
        Self {
            rate_limit: 10,
            rate_window: Duration::from_millis(100),
            call_timeout: Duration::from_millis(50),
            failure_threshold: 3,
            open_timeout: Duration::from_millis(100),
        }
    }
}
