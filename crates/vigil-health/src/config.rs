//! Health monitor configuration

use crate::reassign::TargetPolicy;
use serde::{Deserialize, Serialize};

/// Configuration for the health monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Heartbeat staleness threshold in milliseconds. An instance whose last
    /// heartbeat is strictly older than this is declared failed.
    pub default_timeout_ms: i64,

    /// How reassignment targets are chosen among active instances.
    pub target_policy: TargetPolicy,

    /// Capacity of the health event broadcast channel.
    pub event_capacity: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 10_000,
            target_policy: TargetPolicy::RoundRobin,
            event_capacity: 1024,
        }
    }
}
