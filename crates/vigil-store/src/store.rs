//! Store traits consumed by the health core
//!
//! The concrete backend (key-value store, its scripting engine, its wire
//! protocol) is an external collaborator. The core only sees these traits.
//! Production deployments back them with a shared store whose transfer
//! primitive runs server-side as one atomic script; the in-memory backend in
//! [`crate::memory`] satisfies the same contract with a single-lock
//! transaction.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vigil_types::{HealthMetrics, InstanceId, ReassignmentResult, TaskId, WorkerInstance};

/// Read/write access to per-instance liveness records and aggregate metrics.
#[async_trait]
pub trait HeartbeatStore: Send + Sync {
    /// Record a heartbeat for an instance at `now`.
    ///
    /// Creates the record (Active) on first report; on later reports bumps
    /// `last_seen` without moving it backwards and restores Active status. A
    /// heartbeat from an instance previously declared Offline re-registers it
    /// as an empty worker; its tasks were already moved atomically, so no
    /// ownership is disturbed.
    async fn record_heartbeat(&self, id: &InstanceId, now: DateTime<Utc>)
        -> Result<WorkerInstance>;

    /// Fetch a single instance record.
    async fn get_instance(&self, id: &InstanceId) -> Result<Option<WorkerInstance>>;

    /// Enumerate all known instance records.
    async fn list_instances(&self) -> Result<Vec<WorkerInstance>>;

    /// Transition an instance to Offline. The record is kept.
    async fn mark_offline(&self, id: &InstanceId) -> Result<()>;

    /// Overwrite the aggregate fleet metrics.
    async fn write_metrics(&self, metrics: HealthMetrics) -> Result<()>;

    /// Read the last written aggregate metrics, if any pass has completed.
    async fn read_metrics(&self) -> Result<Option<HealthMetrics>>;
}

/// Task ownership relation: each task has at most one owner at any instant.
///
/// `transfer_ownership` is the atomicity boundary the whole runtime leans on.
/// Implementations must perform the read of the dead owner's tasks and every
/// ownership write as one indivisible step, never as separate calls, so that
/// concurrent reassignment attempts (or a late heartbeat from the presumed
/// dead owner) cannot produce split-brain ownership.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Record that `owner` owns `task`, replacing any previous owner.
    async fn assign_task(&self, task: &TaskId, owner: &InstanceId) -> Result<()>;

    /// Current owner of a task, if any.
    async fn owner_of(&self, task: &TaskId) -> Result<Option<InstanceId>>;

    /// All tasks currently owned by an instance, sorted by task id.
    async fn tasks_owned_by(&self, owner: &InstanceId) -> Result<Vec<TaskId>>;

    /// Number of tasks currently owned by an instance.
    async fn task_count(&self, owner: &InstanceId) -> Result<u64>;

    /// Atomically move every task owned by `from` onto `targets`.
    ///
    /// Tasks are distributed round-robin across `targets` in task order; the
    /// result lists the chosen target per moved task. With no tasks to move
    /// the result is empty. Callers are responsible for passing a non-empty,
    /// deterministic target list; an empty list moves nothing and leaves
    /// ownership attributed to `from` (fail closed).
    async fn transfer_ownership(
        &self,
        from: &InstanceId,
        targets: &[InstanceId],
    ) -> Result<ReassignmentResult>;
}
