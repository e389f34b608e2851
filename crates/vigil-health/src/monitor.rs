//! Health monitor for fleet failure detection
//!
//! The monitor enumerates instance records, classifies each as healthy or
//! failed, triggers reassignment for freshly failed instances, publishes
//! failure notifications, and records aggregate metrics. The enumerate-then-
//! act pattern is inherently racy at the read step; safety at the write step
//! comes from the reassignment executor's atomic transfer, so no fleet-wide
//! lock is held across a pass and concurrent passes cannot double-move tasks.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use vigil_store::HeartbeatStore;
use vigil_types::{HealthMetrics, InstanceId, InstanceStatus};

use crate::config::HealthConfig;
use crate::error::HealthResult;
use crate::reassign::ReassignmentExecutor;

/// Events emitted by the health monitor.
///
/// Delivery is fire-and-forget over a broadcast channel; a pass never blocks
/// on, or fails because of, slow subscribers.
#[derive(Debug, Clone)]
pub enum HealthEvent {
    /// A stale instance was declared failed and its tasks were reassigned.
    WorkerFailed {
        instance_id: InstanceId,
        last_seen: Option<DateTime<Utc>>,
        tasks_reassigned: u64,
    },

    /// A monitor pass finished and metrics were written.
    CheckCompleted { healthy: u64, failed: u64 },
}

/// Result of one health check pass.
///
/// `reassigned` only contains instances for which tasks actually moved;
/// failed instances with nothing to move are counted in `failed` but omitted
/// from the mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: Vec<InstanceId>,
    pub failed: Vec<InstanceId>,
    pub reassigned: BTreeMap<InstanceId, u64>,
}

/// Fleet health monitor.
pub struct HealthMonitor {
    heartbeats: Arc<dyn HeartbeatStore>,
    executor: ReassignmentExecutor,
    config: HealthConfig,
    event_tx: broadcast::Sender<HealthEvent>,
}

impl HealthMonitor {
    pub fn new(
        heartbeats: Arc<dyn HeartbeatStore>,
        executor: ReassignmentExecutor,
        config: HealthConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        Self {
            heartbeats,
            executor,
            config,
            event_tx,
        }
    }

    /// Subscribe to health events.
    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.event_tx.subscribe()
    }

    /// Run one pass with the configured default staleness threshold.
    pub async fn check_health_default(&self) -> HealthResult<HealthReport> {
        self.check_health(self.config.default_timeout_ms).await
    }

    /// Run one pass: classify every instance, reassign tasks of stale ones,
    /// publish failure events, and write aggregate metrics.
    pub async fn check_health(&self, timeout_ms: i64) -> HealthResult<HealthReport> {
        self.check_health_at(Utc::now(), timeout_ms).await
    }

    /// Deterministic variant of [`check_health`](Self::check_health) taking
    /// the reference time explicitly.
    ///
    /// Classification per instance, in no particular order:
    ///
    /// - `Offline`: failed, no reassignment (already handled on the pass that
    ///   declared it dead)
    /// - no heartbeat ever reported: failed, no reassignment (such an
    ///   instance cannot own tasks yet)
    /// - heartbeat age strictly greater than `timeout_ms`: failed, tasks
    ///   reassigned; age exactly equal to the threshold is still healthy
    ///
    /// One instance's reassignment failure is surfaced as zero-reassigned and
    /// never aborts the pass; a store outage aborts the pass with no metrics
    /// write.
    #[instrument(skip(self, now))]
    pub async fn check_health_at(
        &self,
        now: DateTime<Utc>,
        timeout_ms: i64,
    ) -> HealthResult<HealthReport> {
        let instances = self.heartbeats.list_instances().await?;

        let mut healthy = Vec::new();
        let mut failed = Vec::new();
        let mut reassigned = BTreeMap::new();

        for instance in instances {
            if instance.status == InstanceStatus::Offline {
                failed.push(instance.id);
                continue;
            }

            let Some(age_ms) = instance.heartbeat_age_ms(now) else {
                debug!(instance_id = %instance.id, "instance never reported, classifying failed");
                failed.push(instance.id);
                continue;
            };

            if age_ms <= timeout_ms {
                healthy.push(instance.id);
                continue;
            }

            info!(
                instance_id = %instance.id,
                age_ms,
                timeout_ms,
                "instance heartbeat is stale, declaring failed"
            );
            failed.push(instance.id.clone());

            match self.executor.reassign(&instance.id).await {
                Ok(outcome) => {
                    if outcome.result.reassigned_count > 0 {
                        reassigned.insert(instance.id.clone(), outcome.result.reassigned_count);
                        let _ = self.event_tx.send(HealthEvent::WorkerFailed {
                            instance_id: instance.id.clone(),
                            last_seen: instance.last_seen,
                            tasks_reassigned: outcome.result.reassigned_count,
                        });
                    }
                    // Only written off once its tasks are gone; an undrained
                    // instance stays Active so a later pass retries.
                    if outcome.drained {
                        if let Err(e) = self.heartbeats.mark_offline(&instance.id).await {
                            warn!(instance_id = %instance.id, error = %e, "failed to mark instance offline");
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        instance_id = %instance.id,
                        error = %e,
                        "reassignment failed, will retry on a later pass"
                    );
                }
            }
        }

        self.heartbeats
            .write_metrics(HealthMetrics {
                healthy_instances: healthy.len() as u64,
                failed_instances: failed.len() as u64,
                last_check: now,
            })
            .await?;

        let _ = self.event_tx.send(HealthEvent::CheckCompleted {
            healthy: healthy.len() as u64,
            failed: failed.len() as u64,
        });

        healthy.sort();
        failed.sort();

        Ok(HealthReport {
            healthy,
            failed,
            reassigned,
        })
    }

    /// Whether an instance is currently considered alive: Active with a
    /// heartbeat no older than `timeout_ms`. Workers use this to detect they
    /// were presumed dead and must re-register.
    pub async fn is_alive(&self, id: &InstanceId, timeout_ms: i64) -> HealthResult<bool> {
        let Some(instance) = self.heartbeats.get_instance(id).await? else {
            return Ok(false);
        };
        if instance.status != InstanceStatus::Active {
            return Ok(false);
        }
        Ok(instance
            .heartbeat_age_ms(Utc::now())
            .map(|age| age <= timeout_ms)
            .unwrap_or(false))
    }

    /// Aggregate metrics from the last completed pass, if any.
    pub async fn fleet_summary(&self) -> HealthResult<Option<HealthMetrics>> {
        Ok(self.heartbeats.read_metrics().await?)
    }
}
