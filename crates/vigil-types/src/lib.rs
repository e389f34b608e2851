//! Vigil Types - Core types for the fault-tolerant dispatch runtime
//!
//! Vigil dispatches work to a fleet of stateful worker instances. Workers
//! heartbeat into a shared store; a monitor detects staleness and reassigns a
//! dead worker's tasks to live workers exactly once. Every dispatched unit of
//! work is additionally wrapped by a resilience guard (rate limit, timeout,
//! circuit breaker, fallback).
//!
//! ## Architectural Boundaries
//!
//! - **vigil-types** owns: identifiers and the shared record shapes
//! - **vigil-store** owns: the store traits the core consumes, plus an
//!   in-memory backend for development and tests
//! - **vigil-guard** owns: the per-invocation resilience state machine
//! - **vigil-health** owns: heartbeats, reassignment, and the health monitor

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod ids;
pub mod instance;

// Re-export main types
pub use ids::{InstanceId, OperationId, TaskId};
pub use instance::{HealthMetrics, InstanceStatus, ReassignmentResult, WorkerInstance};
