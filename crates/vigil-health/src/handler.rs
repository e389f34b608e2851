//! Operation invocation boundary
//!
//! The dispatch framework routes a named operation to a [`Handler`] and
//! schema-validates input and output on either side of it; this module
//! assumes both are already well-typed structured data. Resilience is applied
//! by wrapping a handler in [`Guarded`]; decorators implement `Handler`
//! themselves, so stages compose by nesting.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;
use vigil_guard::{GuardError, OperationGuard};
use vigil_types::{InstanceId, OperationId};

use crate::error::{HealthError, HealthResult};
use crate::monitor::HealthMonitor;

/// Per-invocation context supplied by the dispatch framework.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Worker instance executing this invocation
    pub instance_id: InstanceId,

    /// Correlation id for tracing
    pub request_id: Uuid,
}

impl HandlerContext {
    pub fn new(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            request_id: Uuid::new_v4(),
        }
    }
}

/// One named operation behind the dispatch boundary.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Operation identity; guard state is scoped by this.
    fn operation(&self) -> OperationId;

    /// Execute the operation.
    async fn handle(&self, input: Value, ctx: &HandlerContext) -> HealthResult<Value>;
}

/// Fallback payload served while a breaker is open.
pub fn open_circuit_fallback() -> Value {
    json!({
        "success": false,
        "message": "Circuit breaker open - fallback response",
    })
}

/// Decorator running a handler through a resilience guard.
///
/// Guard rejections map onto the health error taxonomy: the caller always
/// gets the real result, the configured fallback, or a typed failure.
pub struct Guarded<H> {
    inner: H,
    guard: Arc<OperationGuard>,
    fallback: Option<Value>,
}

impl<H: Handler> Guarded<H> {
    pub fn new(inner: H, guard: Arc<OperationGuard>) -> Self {
        Self {
            inner,
            guard,
            fallback: None,
        }
    }

    /// Serve `fallback` instead of failing while the breaker is open.
    pub fn with_fallback(mut self, fallback: Value) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

#[async_trait]
impl<H: Handler> Handler for Guarded<H> {
    fn operation(&self) -> OperationId {
        self.inner.operation()
    }

    async fn handle(&self, input: Value, ctx: &HandlerContext) -> HealthResult<Value> {
        let outcome = self
            .guard
            .execute(self.inner.handle(input, ctx), self.fallback.clone())
            .await;

        match outcome {
            Ok(value) => Ok(value),
            Err(GuardError::RateLimitExceeded) => Err(HealthError::RateLimited),
            Err(GuardError::Timeout(after)) => Err(HealthError::Timeout(after)),
            Err(GuardError::CircuitOpen) => Err(HealthError::CircuitOpen),
            Err(GuardError::Inner(e)) => Err(e),
        }
    }
}

/// Health-check surface exposed to the dispatch framework.
///
/// Input `{ "timeoutMs": n }` (default 10000); output
/// `{ "healthy": [..], "failed": [..], "reassigned": { id: n } }`.
pub struct HealthCheckHandler {
    monitor: Arc<HealthMonitor>,
}

impl HealthCheckHandler {
    pub const OPERATION: &'static str = "fleet.health";

    pub fn new(monitor: Arc<HealthMonitor>) -> Self {
        Self { monitor }
    }
}

#[async_trait]
impl Handler for HealthCheckHandler {
    fn operation(&self) -> OperationId {
        OperationId::new(Self::OPERATION)
    }

    async fn handle(&self, input: Value, _ctx: &HandlerContext) -> HealthResult<Value> {
        let timeout_ms = match input.get("timeoutMs") {
            None | Some(Value::Null) => 10_000,
            Some(v) => v
                .as_i64()
                .filter(|t| *t > 0)
                .ok_or_else(|| {
                    HealthError::InvalidInput(format!("timeoutMs must be a positive integer, got {v}"))
                })?,
        };

        let report = self.monitor.check_health(timeout_ms).await?;
        serde_json::to_value(&report)
            .map_err(|e| HealthError::InvalidInput(format!("unserializable report: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HealthConfig;
    use crate::reassign::{ReassignmentExecutor, TargetPolicy};
    use vigil_store::{HeartbeatStore, MemoryStore};

    fn health_handler() -> HealthCheckHandler {
        let store = Arc::new(MemoryStore::new());
        let executor =
            ReassignmentExecutor::new(store.clone(), store.clone(), TargetPolicy::RoundRobin);
        let monitor = Arc::new(HealthMonitor::new(
            store,
            executor,
            HealthConfig::default(),
        ));
        HealthCheckHandler::new(monitor)
    }

    fn ctx() -> HandlerContext {
        HandlerContext::new(InstanceId::new("test-worker"))
    }

    #[tokio::test]
    async fn defaults_timeout_to_ten_seconds() {
        let handler = health_handler();
        let output = handler.handle(json!({}), &ctx()).await.unwrap();

        assert_eq!(output["healthy"], json!([]));
        assert_eq!(output["failed"], json!([]));
        assert_eq!(output["reassigned"], json!({}));
    }

    #[tokio::test]
    async fn rejects_non_positive_timeout() {
        let handler = health_handler();
        let err = handler
            .handle(json!({ "timeoutMs": 0 }), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, HealthError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn reports_contain_stale_workers() {
        let store = Arc::new(MemoryStore::new());
        let now = chrono::Utc::now();
        store
            .record_heartbeat(&InstanceId::new("stale"), now - chrono::Duration::seconds(60))
            .await
            .unwrap();
        let executor =
            ReassignmentExecutor::new(store.clone(), store.clone(), TargetPolicy::RoundRobin);
        let monitor = Arc::new(HealthMonitor::new(
            store,
            executor,
            HealthConfig::default(),
        ));
        let handler = HealthCheckHandler::new(monitor);

        let output = handler
            .handle(json!({ "timeoutMs": 10_000 }), &ctx())
            .await
            .unwrap();
        assert_eq!(output["failed"], json!(["stale"]));
    }
}
