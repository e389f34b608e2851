//! Reassignment executor
//!
//! Given a presumed-dead instance, moves its owned tasks to live instances
//! through the store's atomic transfer primitive. The enumeration of live
//! targets is a racy read by design; correctness comes entirely from the
//! atomicity of [`TaskStore::transfer_ownership`], not from locking here.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use vigil_store::{HeartbeatStore, TaskStore};
use vigil_types::{InstanceId, ReassignmentResult};

use crate::error::HealthResult;

/// How reassignment targets are chosen among active instances.
///
/// Both policies are deterministic given the same snapshot of active workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPolicy {
    /// Targets ordered by instance id; tasks dealt round-robin
    RoundRobin,

    /// Targets ordered by current task count (ties broken by id)
    LeastLoaded,
}

/// Outcome of one reassignment attempt.
#[derive(Debug, Clone)]
pub struct ReassignmentOutcome {
    /// What moved, and where
    pub result: ReassignmentResult,

    /// False when live tasks remain attributed to the dead instance because
    /// no eligible target existed. The caller may retry on a later pass and
    /// must not write the instance off as fully handled.
    pub drained: bool,
}

/// Executes task reassignment for presumed-dead instances.
pub struct ReassignmentExecutor {
    heartbeats: Arc<dyn HeartbeatStore>,
    tasks: Arc<dyn TaskStore>,
    policy: TargetPolicy,
}

impl ReassignmentExecutor {
    pub fn new(
        heartbeats: Arc<dyn HeartbeatStore>,
        tasks: Arc<dyn TaskStore>,
        policy: TargetPolicy,
    ) -> Self {
        Self {
            heartbeats,
            tasks,
            policy,
        }
    }

    /// Move every task owned by `dead` onto live instances.
    ///
    /// Fails closed when no active worker can receive tasks: ownership stays
    /// attributed to `dead` and the outcome reports zero moved. Idempotent
    /// by construction - once a transfer succeeds the dead instance owns
    /// nothing, so a second attempt moves zero tasks.
    #[instrument(skip(self), fields(instance_id = %dead))]
    pub async fn reassign(&self, dead: &InstanceId) -> HealthResult<ReassignmentOutcome> {
        let targets = self.eligible_targets(dead).await?;

        if targets.is_empty() {
            let stranded = self.tasks.task_count(dead).await?;
            if stranded > 0 {
                warn!(
                    instance_id = %dead,
                    stranded,
                    "no active workers to receive tasks, failing closed"
                );
                return Ok(ReassignmentOutcome {
                    result: ReassignmentResult::empty(),
                    drained: false,
                });
            }
            return Ok(ReassignmentOutcome {
                result: ReassignmentResult::empty(),
                drained: true,
            });
        }

        let result = self.tasks.transfer_ownership(dead, &targets).await?;

        if result.reassigned_count > 0 {
            info!(
                instance_id = %dead,
                reassigned = result.reassigned_count,
                "reassigned tasks from dead instance"
            );
        }

        Ok(ReassignmentOutcome {
            result,
            drained: true,
        })
    }

    /// Snapshot the active instances eligible to receive tasks, ordered per
    /// the configured policy.
    async fn eligible_targets(&self, dead: &InstanceId) -> HealthResult<Vec<InstanceId>> {
        let mut active: Vec<InstanceId> = self
            .heartbeats
            .list_instances()
            .await?
            .into_iter()
            .filter(|i| i.status.is_active() && &i.id != dead)
            .map(|i| i.id)
            .collect();

        match self.policy {
            TargetPolicy::RoundRobin => {
                active.sort();
            }
            TargetPolicy::LeastLoaded => {
                let mut loaded = Vec::with_capacity(active.len());
                for id in active {
                    let count = self.tasks.task_count(&id).await?;
                    loaded.push((count, id));
                }
                loaded.sort();
                active = loaded.into_iter().map(|(_, id)| id).collect();
            }
        }

        Ok(active)
    }
}
