//! # Vigil Health - Failure Detection and Task Reassignment
//!
//! This crate is the control loop of the Vigil dispatch runtime: workers
//! heartbeat into the shared store, the monitor detects staleness, and a dead
//! worker's tasks are moved to live workers exactly once.
//!
//! ## Overview
//!
//! - Workers call [`vigil_store::HeartbeatStore::record_heartbeat`]
//!   periodically to maintain their liveness record
//! - [`HealthMonitor::check_health`] classifies every instance as healthy or
//!   failed, reassigns the tasks of freshly stale instances, publishes
//!   [`HealthEvent::WorkerFailed`] notifications, and writes aggregate
//!   metrics
//! - [`ReassignmentExecutor`] moves ownership through the store's atomic
//!   transfer primitive; a task has at most one owner at any instant, even
//!   under concurrent passes
//! - [`HealthCheckHandler`] exposes the check to the dispatch framework, and
//!   [`Guarded`] wraps any handler in the resilience guard from
//!   [`vigil_guard`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigil_health::{
//!     HealthConfig, HealthMonitor, ReassignmentExecutor, TargetPolicy,
//! };
//! use vigil_store::MemoryStore;
//!
//! # async fn example() {
//! let store = Arc::new(MemoryStore::new());
//! let executor =
//!     ReassignmentExecutor::new(store.clone(), store.clone(), TargetPolicy::RoundRobin);
//! let monitor = HealthMonitor::new(store, executor, HealthConfig::default());
//!
//! let report = monitor.check_health(10_000).await.unwrap();
//! println!("healthy: {}, failed: {}", report.healthy.len(), report.failed.len());
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! Multiple runtime instances may run the monitor concurrently against the
//! same store. The enumeration step is racy by design; correctness comes from
//! the atomicity of the ownership transfer, not from monitor-level locking.
//! Guard state (breakers, rate windows) is process-scoped and keyed by
//! operation identity.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod error;
pub mod handler;
pub mod monitor;
pub mod reassign;

// Re-export main types
pub use config::HealthConfig;
pub use error::{HealthError, HealthResult};
pub use handler::{open_circuit_fallback, Guarded, Handler, HandlerContext, HealthCheckHandler};
pub use monitor::{HealthEvent, HealthMonitor, HealthReport};
pub use reassign::{ReassignmentExecutor, ReassignmentOutcome, TargetPolicy};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use std::sync::Arc;
    use vigil_guard::{GuardConfig, GuardRegistry};
    use vigil_store::{HeartbeatStore, MemoryStore, TaskStore};
    use vigil_types::{InstanceId, OperationId, TaskId};

    fn monitor_over(store: Arc<MemoryStore>) -> Arc<HealthMonitor> {
        let executor =
            ReassignmentExecutor::new(store.clone(), store.clone(), TargetPolicy::RoundRobin);
        Arc::new(HealthMonitor::new(store, executor, HealthConfig::default()))
    }

    #[tokio::test]
    async fn stale_worker_with_tasks_is_failed_reassigned_and_announced() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let last_seen = now - Duration::milliseconds(15_000);

        store
            .record_heartbeat(&InstanceId::new("worker-7"), last_seen)
            .await
            .unwrap();
        store
            .record_heartbeat(&InstanceId::new("worker-1"), now)
            .await
            .unwrap();
        store
            .record_heartbeat(&InstanceId::new("worker-2"), now)
            .await
            .unwrap();
        for n in 1..=3 {
            store
                .assign_task(&TaskId::new(format!("task-{n}")), &InstanceId::new("worker-7"))
                .await
                .unwrap();
        }

        let monitor = monitor_over(store.clone());
        let mut events = monitor.subscribe();

        let report = monitor.check_health_at(now, 10_000).await.unwrap();

        assert_eq!(report.failed, vec![InstanceId::new("worker-7")]);
        assert_eq!(
            report.healthy,
            vec![InstanceId::new("worker-1"), InstanceId::new("worker-2")]
        );
        assert_eq!(report.reassigned[&InstanceId::new("worker-7")], 3);

        match events.recv().await.unwrap() {
            HealthEvent::WorkerFailed {
                instance_id,
                last_seen: seen,
                tasks_reassigned,
            } => {
                assert_eq!(instance_id, InstanceId::new("worker-7"));
                assert_eq!(seen, Some(last_seen));
                assert_eq!(tasks_reassigned, 3);
            }
            other => panic!("expected WorkerFailed, got {other:?}"),
        }

        // The dead worker owns nothing; the survivors took its tasks.
        assert_eq!(
            store.task_count(&InstanceId::new("worker-7")).await.unwrap(),
            0
        );
        assert_eq!(
            store.task_count(&InstanceId::new("worker-1")).await.unwrap(),
            2
        );
        assert_eq!(
            store.task_count(&InstanceId::new("worker-2")).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn second_pass_does_not_reassign_again() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store
            .record_heartbeat(&InstanceId::new("dead"), now - Duration::seconds(60))
            .await
            .unwrap();
        store
            .record_heartbeat(&InstanceId::new("live"), now)
            .await
            .unwrap();
        store
            .assign_task(&TaskId::new("task-1"), &InstanceId::new("dead"))
            .await
            .unwrap();

        let monitor = monitor_over(store.clone());

        let first = monitor.check_health_at(now, 10_000).await.unwrap();
        assert_eq!(first.reassigned[&InstanceId::new("dead")], 1);

        // Now Offline: still failed, but the executor never runs again.
        let second = monitor.check_health_at(now, 10_000).await.unwrap();
        assert_eq!(second.failed, vec![InstanceId::new("dead")]);
        assert!(second.reassigned.is_empty());
    }

    #[tokio::test]
    async fn stranded_worker_is_retried_until_a_target_appears() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store
            .record_heartbeat(&InstanceId::new("dead"), now - Duration::seconds(60))
            .await
            .unwrap();
        store
            .assign_task(&TaskId::new("task-1"), &InstanceId::new("dead"))
            .await
            .unwrap();

        let monitor = monitor_over(store.clone());

        // No live targets: failed, nothing moved, not written off.
        let report = monitor.check_health_at(now, 10_000).await.unwrap();
        assert_eq!(report.failed, vec![InstanceId::new("dead")]);
        assert!(report.reassigned.is_empty());

        // A worker joins; the next pass drains the dead instance.
        store
            .record_heartbeat(&InstanceId::new("joiner"), now)
            .await
            .unwrap();
        let report = monitor.check_health_at(now, 10_000).await.unwrap();
        assert_eq!(report.reassigned[&InstanceId::new("dead")], 1);
        assert_eq!(
            store
                .owner_of(&TaskId::new("task-1"))
                .await
                .unwrap(),
            Some(InstanceId::new("joiner"))
        );
    }

    #[tokio::test]
    async fn open_breaker_serves_the_configured_fallback() {
        struct FailingHandler;

        #[async_trait::async_trait]
        impl Handler for FailingHandler {
            fn operation(&self) -> OperationId {
                OperationId::new("fleet.flaky")
            }

            async fn handle(
                &self,
                _input: serde_json::Value,
                _ctx: &HandlerContext,
            ) -> HealthResult<serde_json::Value> {
                Err(HealthError::InvalidInput("downstream degraded".to_string()))
            }
        }

        let registry = GuardRegistry::new(GuardConfig {
            failure_threshold: 5,
            open_timeout: std::time::Duration::from_secs(60),
            ..GuardConfig::default()
        });
        let guard = registry.guard(&OperationId::new("fleet.flaky"));
        let handler = Guarded::new(FailingHandler, guard).with_fallback(open_circuit_fallback());
        let ctx = HandlerContext::new(InstanceId::new("test-worker"));

        for _ in 0..5 {
            handler.handle(json!({}), &ctx).await.unwrap_err();
        }

        // Sixth call short-circuits to the fallback without running logic.
        let output = handler.handle(json!({}), &ctx).await.unwrap();
        assert_eq!(output["success"], json!(false));
        assert_eq!(
            output["message"],
            json!("Circuit breaker open - fallback response")
        );
    }

    #[tokio::test]
    async fn guarded_health_check_end_to_end() {
        let store = Arc::new(MemoryStore::new());
        store
            .record_heartbeat(&InstanceId::new("w-1"), Utc::now())
            .await
            .unwrap();
        let monitor = monitor_over(store);

        let registry = GuardRegistry::default();
        let inner = HealthCheckHandler::new(monitor);
        let guard = registry.guard(&inner.operation());
        let handler = Guarded::new(inner, guard).with_fallback(open_circuit_fallback());
        let ctx = HandlerContext::new(InstanceId::new("w-1"));

        let output = handler.handle(json!({}), &ctx).await.unwrap();
        assert_eq!(output["healthy"], json!(["w-1"]));
    }
}
