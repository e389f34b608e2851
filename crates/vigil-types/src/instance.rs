//! Worker instance records and reassignment outcomes
//!
//! A WorkerInstance is the liveness record a worker maintains by heartbeating.
//! It is created on the first heartbeat, mutated on every subsequent one, and
//! transitioned to `Offline` by the health monitor when stale. The core never
//! deletes instance records; cleanup belongs to an external collaborator.

use crate::InstanceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness record for a single worker instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInstance {
    /// Unique instance identifier
    pub id: InstanceId,

    /// Current lifecycle status
    pub status: InstanceStatus,

    /// Last heartbeat timestamp; absent until the worker first reports.
    /// Monotonically non-decreasing once set.
    pub last_seen: Option<DateTime<Utc>>,
}

impl WorkerInstance {
    /// Create a record for a worker that just reported its first heartbeat.
    pub fn new(id: InstanceId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: InstanceStatus::Active,
            last_seen: Some(now),
        }
    }

    /// Age of the last heartbeat in milliseconds, if one was ever reported.
    pub fn heartbeat_age_ms(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_seen
            .map(|seen| now.signed_duration_since(seen).num_milliseconds())
    }
}

/// Instance lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceStatus {
    /// Instance is heartbeating and eligible to own tasks
    Active,

    /// Instance was declared dead by the health monitor
    Offline,
}

impl InstanceStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, InstanceStatus::Active)
    }
}

/// Outcome of one reassignment attempt for a presumed-dead instance.
///
/// Produced once per attempt and never mutated afterwards. `target_workers`
/// lists, in task order, the instance each moved task was handed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignmentResult {
    /// Number of tasks that changed owner
    pub reassigned_count: u64,

    /// Receiving instance per moved task, in order
    pub target_workers: Vec<InstanceId>,
}

impl ReassignmentResult {
    /// Result of an attempt that moved nothing (no tasks, or no live targets).
    pub fn empty() -> Self {
        Self {
            reassigned_count: 0,
            target_workers: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reassigned_count == 0
    }
}

/// Aggregate fleet health, overwritten wholesale on every monitor pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// Instances classified healthy on the last pass
    pub healthy_instances: u64,

    /// Instances classified failed on the last pass
    pub failed_instances: u64,

    /// When the last pass ran
    pub last_check: DateTime<Utc>,
}
