//! In-memory implementations of the store traits
//!
//! Suitable for development and testing. Production deployments back the
//! traits with a shared store whose transfer primitive executes atomically
//! server-side; here the same contract is met by holding a single lock over
//! the whole ownership relation for the duration of the transfer.

use crate::error::{Result, StoreError};
use crate::store::{HeartbeatStore, TaskStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use vigil_types::{
    HealthMetrics, InstanceId, InstanceStatus, ReassignmentResult, TaskId, WorkerInstance,
};

/// In-memory heartbeat and task store
pub struct MemoryStore {
    instances: DashMap<InstanceId, WorkerInstance>,

    // BTreeMap keeps task iteration order deterministic; the single lock is
    // what makes `transfer_ownership` indivisible.
    ownership: Mutex<BTreeMap<TaskId, InstanceId>>,

    metrics: Mutex<Option<HealthMetrics>>,

    // Simulated outage switch for failure-path tests.
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            instances: DashMap::new(),
            ownership: Mutex::new(BTreeMap::new()),
            metrics: Mutex::new(None),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate the backend going away. While set, every operation returns
    /// [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }

    /// Insert a record directly, bypassing heartbeat semantics. Test helper
    /// for building fleets with specific `last_seen`/status combinations.
    pub fn put_instance(&self, instance: WorkerInstance) {
        self.instances.insert(instance.id.clone(), instance);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HeartbeatStore for MemoryStore {
    async fn record_heartbeat(
        &self,
        id: &InstanceId,
        now: DateTime<Utc>,
    ) -> Result<WorkerInstance> {
        self.check_available()?;

        let mut entry = self
            .instances
            .entry(id.clone())
            .or_insert_with(|| WorkerInstance::new(id.clone(), now));

        // last_seen never moves backwards, even if callers race on `now`.
        let seen = match entry.last_seen {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        entry.last_seen = Some(seen);
        entry.status = InstanceStatus::Active;

        Ok(entry.clone())
    }

    async fn get_instance(&self, id: &InstanceId) -> Result<Option<WorkerInstance>> {
        self.check_available()?;
        Ok(self.instances.get(id).map(|i| i.clone()))
    }

    async fn list_instances(&self) -> Result<Vec<WorkerInstance>> {
        self.check_available()?;
        Ok(self.instances.iter().map(|i| i.value().clone()).collect())
    }

    async fn mark_offline(&self, id: &InstanceId) -> Result<()> {
        self.check_available()?;
        let mut instance = self
            .instances
            .get_mut(id)
            .ok_or_else(|| StoreError::InstanceNotFound(id.clone()))?;
        instance.status = InstanceStatus::Offline;
        Ok(())
    }

    async fn write_metrics(&self, metrics: HealthMetrics) -> Result<()> {
        self.check_available()?;
        *self.metrics.lock().await = Some(metrics);
        Ok(())
    }

    async fn read_metrics(&self) -> Result<Option<HealthMetrics>> {
        self.check_available()?;
        Ok(self.metrics.lock().await.clone())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn assign_task(&self, task: &TaskId, owner: &InstanceId) -> Result<()> {
        self.check_available()?;
        self.ownership
            .lock()
            .await
            .insert(task.clone(), owner.clone());
        Ok(())
    }

    async fn owner_of(&self, task: &TaskId) -> Result<Option<InstanceId>> {
        self.check_available()?;
        Ok(self.ownership.lock().await.get(task).cloned())
    }

    async fn tasks_owned_by(&self, owner: &InstanceId) -> Result<Vec<TaskId>> {
        self.check_available()?;
        Ok(self
            .ownership
            .lock()
            .await
            .iter()
            .filter(|(_, o)| *o == owner)
            .map(|(t, _)| t.clone())
            .collect())
    }

    async fn task_count(&self, owner: &InstanceId) -> Result<u64> {
        self.check_available()?;
        Ok(self
            .ownership
            .lock()
            .await
            .values()
            .filter(|o| *o == owner)
            .count() as u64)
    }

    async fn transfer_ownership(
        &self,
        from: &InstanceId,
        targets: &[InstanceId],
    ) -> Result<ReassignmentResult> {
        self.check_available()?;

        // One lock over read + every write: a concurrent transfer for the
        // same owner sees either all tasks or none of them.
        let mut ownership = self.ownership.lock().await;

        if targets.is_empty() {
            return Ok(ReassignmentResult::empty());
        }

        let owned: Vec<TaskId> = ownership
            .iter()
            .filter(|(_, o)| *o == from)
            .map(|(t, _)| t.clone())
            .collect();

        let mut target_workers = Vec::with_capacity(owned.len());
        for (i, task) in owned.iter().enumerate() {
            let target = targets[i % targets.len()].clone();
            ownership.insert(task.clone(), target.clone());
            target_workers.push(target);
        }

        Ok(ReassignmentResult {
            reassigned_count: owned.len() as u64,
            target_workers,
        })
    }
}
